use anyhow::{bail, Context};
use clap::Parser;
use colored::*;
use std::collections::HashMap;
use std::io::Write;
use std::process;

use apifuzz_core::{
    format_response, parse_custom_headers, parse_status_list, send_once, ConfigError, ConsoleSink,
    EndpointCatalog, FuzzOptions, Fuzzer, ParameterSet, RequestTemplate, RunControl, Wordlist,
};

#[derive(Parser, Debug)]
#[command(
    name = "APIFUZZ",
    version,
    about = "HTTP/JSON API parameter fuzzer",
    override_usage = "apifuzz --url <URL> --params <NAMES> --wordlist <FILE> [options]",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Single parameter:               apifuzz --url http://api.local/users/<<FUZZ_id>> -X GET -p id -w ids.txt
  JSON body:                      apifuzz --url http://api.local/users -d '{\"role\":\"<<FUZZ_role>>\"}' -p role -w roles.txt
  Every combination:              apifuzz --url http://api.local/u/<<FUZZ_id>> -d '{\"role\":\"<<FUZZ_role>>\"}' -p id,role --combo -w w.txt
  Only show 200/500:              apifuzz ... --filter-status-codes 200,500
  Save everything + report:       apifuzz ... --save --save-request --save-response --report report.html
  Through Burp:                   apifuzz ... --proxy http://127.0.0.1:8080 --auth-header \"Bearer TOKEN\"
  List endpoints:                 apifuzz --endpoints-file endpoints.json --base-url http://api.local --dry-run
  Fuzz endpoint 2:                apifuzz --endpoints-file endpoints.json --base-url http://api.local --endpoint 2 -p petId --set verbose=true -w ids.txt"
)]
pub struct Args {
    #[arg(long, help = "Target URL with <<FUZZ_param>> placeholders")]
    pub url: Option<String>,

    #[arg(short = 'X', long, default_value = "POST", help = "HTTP method")]
    pub method: String,

    #[arg(short = 'd', long, default_value = "", help = "Request body with <<FUZZ_param>> placeholders")]
    pub body: String,

    #[arg(short = 'p', long, help = "Comma-separated list of param names to fuzz")]
    pub params: Option<String>,

    #[arg(short = 'w', long, help = "Path to wordlist file (one payload per line)")]
    pub wordlist: Option<String>,

    #[arg(long, help = "Delay between requests in seconds [default: 0.1]")]
    pub delay: Option<f64>,

    #[arg(long, default_value_t = false, help = "Fuzz every combination of payloads across all params")]
    pub combo: bool,

    #[arg(long, default_value_t = false, help = "Save interesting responses to separate files")]
    pub save: bool,

    #[arg(long, default_value_t = false, help = "Append every kept request to <results>/requests.txt")]
    pub save_request: bool,

    #[arg(long, default_value_t = false, help = "Append every kept response to <results>/responses.txt")]
    pub save_response: bool,

    #[arg(long, help = "Comma-separated status codes to show (allow-list)")]
    pub filter_status_codes: Option<String>,

    #[arg(long, help = "Comma-separated status codes to hide (deny-list)")]
    pub hide_status_codes: Option<String>,

    #[arg(long, help = "Proxy URL (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(long, help = "Report destination; .json writes JSON, anything else HTML")]
    pub report: Option<String>,

    #[arg(long, help = "Authorization header value (e.g. \"Bearer TOKEN\")")]
    pub auth_header: Option<String>,

    #[arg(long, help = "Only keep responses whose body matches this regex (case-insensitive)")]
    pub include_regex: Option<String>,

    #[arg(short = 'H', long = "header", help = "Custom header (e.g. \"X-Api-Key: abc\")")]
    pub headers: Vec<String>,

    #[arg(long, help = "JSON file of resolved endpoint descriptors")]
    pub endpoints_file: Option<String>,

    #[arg(long, help = "Base URL prepended to endpoint paths")]
    pub base_url: Option<String>,

    #[arg(long, help = "1-based index of the endpoint to fuzz")]
    pub endpoint: Option<usize>,

    #[arg(long = "set", value_name = "NAME=VALUE", help = "Static value for a non-fuzzed endpoint param")]
    pub static_values: Vec<String>,

    #[arg(long = "header-value", value_name = "NAME=VALUE", help = "Value for a placeholder endpoint header")]
    pub header_values: Vec<String>,

    #[arg(long, help = "Show what would be fuzzed without sending any request")]
    pub dry_run: bool,

    #[arg(short = 'c', long, help = "JSON options file; flags override its values")]
    pub config: Option<String>,

    #[arg(short = 't', long, help = "Requests in flight at once [default: 1]")]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Request timeout in seconds [default: 10]")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Directory for logs, saved responses and bare report names [default: results]")]
    pub results_dir: Option<String>,

    #[arg(short = 'v', long, default_value_t = false, help = "Debug logging for the engine")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();
    init_logging(args.verbose);
    print_banner();

    if let Err(e) = run(args).await {
        eprint!("{}\r\n", format!("[-] {:#}", e).red());
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "warn,apifuzz_core=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn print_banner() {
    print!("{}\r\n", "APIFUZZ :: HTTP/JSON parameter fuzzer".bright_cyan().bold());
    print!("{}\r\n", "──────────────────────────────────────────────────".dimmed());
    std::io::stdout().flush().ok();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = build_options(&args)?;

    let (template, names) = match args.endpoints_file {
        Some(ref path) => match resolve_endpoint(&args, path)? {
            Some(resolved) => resolved,
            None => return Ok(()),
        },
        None => {
            let url = match args.url {
                Some(ref u) => u.clone(),
                None => bail!("--url is required unless --endpoints-file is used"),
            };
            let raw = args.params.as_deref().unwrap_or("");
            (
                RequestTemplate::new(&args.method, &url, &args.body),
                ParameterSet::parse_names(raw),
            )
        }
    };

    if names.is_empty() {
        if args.endpoints_file.is_some() && !args.dry_run {
            return send_static(&template, &options).await;
        }
        return Err(ConfigError::NoParameters.into());
    }

    let unused = template.unused_parameters(&names);
    if !unused.is_empty() {
        return Err(ConfigError::UnusedParameters(unused.into_iter().map(str::to_string).collect()).into());
    }
    let params = ParameterSet::new(names, args.combo)?;

    if args.dry_run {
        print!(
            "{}\r\n",
            format!(
                "[DRY RUN] Would fuzz {} {} | params: {} | mode: {}",
                template.method,
                template.url,
                params.names().join(", "),
                params.mode()
            )
            .cyan()
        );
        if !template.body.is_empty() {
            print!("  Body template: {}\r\n", template.body);
        }
        return Ok(());
    }

    let wordlist_path = match args.wordlist {
        Some(ref w) => w.as_str(),
        None => bail!("--wordlist is required"),
    };
    let wordlist = Wordlist::load(wordlist_path)?;
    print!(
        "{}\r\n",
        format!("[+] Loaded {} payload(s) from {}", wordlist.len(), wordlist_path).green().bold()
    );

    print_run_config(&template, &params, &options);

    let fuzzer = Fuzzer::new(template, params, wordlist, options)?;

    let control = RunControl::new();
    let signal_control = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprint!("\r\n{}\r\n", "[!] Ctrl-C received, stopping after the current request...".yellow());
            signal_control.cancel();
        }
    });

    let report = fuzzer.run(control, ConsoleSink::new_ref()).await?;
    log::debug!("Run finished: {} ({:?})", report.status, report.stats);
    Ok(())
}

/// Flags are applied over the config file (or the defaults).
fn build_options(args: &Args) -> anyhow::Result<FuzzOptions> {
    let mut options = match args.config {
        Some(ref path) => FuzzOptions::from_file(path)?,
        None => FuzzOptions::default(),
    };

    if let Some(delay) = args.delay {
        options.delay_seconds = delay;
    }
    if args.proxy.is_some() {
        options.proxy = args.proxy.clone();
    }
    if args.auth_header.is_some() {
        options.auth_header = args.auth_header.clone();
    }
    if args.include_regex.is_some() {
        options.include_regex = args.include_regex.clone();
    }
    if args.report.is_some() {
        options.report_destination = args.report.clone();
    }
    if !args.headers.is_empty() {
        options.custom_headers = Some(parse_custom_headers(&args.headers));
    }
    if let Some(ref raw) = args.filter_status_codes {
        options.status_allow_list = Some(parse_status_list(raw)?);
    }
    if let Some(ref raw) = args.hide_status_codes {
        options.status_deny_list = Some(parse_status_list(raw)?);
    }
    options.save_interesting |= args.save;
    options.save_request_log |= args.save_request;
    options.save_response_log |= args.save_response;
    if let Some(n) = args.concurrency {
        options.concurrency = n;
    }
    if let Some(t) = args.timeout {
        options.timeout_seconds = t;
    }
    if let Some(ref dir) = args.results_dir {
        options.results_dir = dir.clone();
    }
    Ok(options)
}

/// Loads the endpoints file and builds the template for the chosen endpoint.
/// Returns `None` when the dry-run listing was printed instead.
fn resolve_endpoint(args: &Args, path: &str) -> anyhow::Result<Option<(RequestTemplate, Vec<String>)>> {
    if args.url.is_some() {
        bail!("use --url only when no endpoints file is given");
    }
    let base_url = match args.base_url {
        Some(ref b) => b.as_str(),
        None => bail!("--endpoints-file requires --base-url"),
    };

    let mut catalog = EndpointCatalog::new();
    let endpoints = catalog.load(std::path::Path::new(path))?;
    if endpoints.is_empty() {
        bail!("no endpoints found in {}", path);
    }

    if args.dry_run {
        print!("\r\nAvailable endpoints:\r\n");
        for (idx, endpoint) in endpoints.iter().enumerate() {
            print!("[{}] {}", idx + 1, endpoint.describe());
        }
        print!("\r\n{}\r\n", "[*] Dry run complete. Exiting.".cyan());
        std::io::stdout().flush().ok();
        return Ok(None);
    }

    let choice = match args.endpoint {
        Some(n) if (1..=endpoints.len()).contains(&n) => n,
        Some(n) => bail!("endpoint {} is out of range (1-{})", n, endpoints.len()),
        None => bail!("--endpoint is required with --endpoints-file (use --dry-run to list them)"),
    };
    let endpoint = &endpoints[choice - 1];

    let selected = ParameterSet::parse_names(args.params.as_deref().unwrap_or(""));
    let static_values = parse_assignments(&args.static_values, "set")?;
    let header_values = parse_assignments(&args.header_values, "header-value")?;

    for header in endpoint.unresolved_headers() {
        if !header_values.contains_key(header) {
            log::warn!("No value supplied for required header '{}'; it will be omitted", header);
        }
    }

    let template = endpoint
        .resolve(base_url, &selected, &static_values, &header_values)
        .with_context(|| format!("cannot prepare endpoint {} {}", endpoint.method, endpoint.url))?;
    Ok(Some((template, selected)))
}

fn parse_assignments(raw: &[String], flag: &str) -> anyhow::Result<HashMap<String, String>> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
            _ => bail!("--{} expects NAME=VALUE, got '{}'", flag, entry),
        })
        .collect()
}

async fn send_static(template: &RequestTemplate, options: &FuzzOptions) -> anyhow::Result<()> {
    print!(
        "{}\r\n",
        "[*] No parameters selected for fuzzing. Sending one request with the provided values.".yellow()
    );
    let (request, response) = send_once(template, options).await?;
    print!("{}\r\n", request.request_line().cyan());
    print!("{}\r\n", format_response(&response));
    Ok(())
}

fn print_run_config(template: &RequestTemplate, params: &ParameterSet, options: &FuzzOptions) {
    print!("{}\r\n", format!("[+] Target:      {} {}", template.method, template.url).green().bold());
    print!("{}\r\n", format!("[+] Params:      {}", params.names().join(", ")).blue());
    print!("{}\r\n", format!("[+] Mode:        {}", params.mode()).magenta().bold());
    print!("{}\r\n", format!("[+] Delay:       {}s", options.delay_seconds).blue());
    if options.concurrency > 1 {
        print!("{}\r\n", format!("[+] Concurrency: {}", options.concurrency).blue());
    }
    if let Some(proxy) = options.proxy_ref() {
        print!("{}\r\n", format!("[+] Proxy:       {}", proxy).yellow());
    }
    if let Some(ref headers) = options.custom_headers {
        print!("{}\r\n", format!("[+] Headers:     {} custom", headers.len()).yellow());
    }
    if let Some(ref re) = options.include_regex {
        print!("{}\r\n", format!("[+] Regex:       {}", re).yellow());
    }
    if let Some(ref dest) = options.report_destination {
        print!("{}\r\n", format!("[+] Report:      {}", dest).blue());
    }
    print!("{}\r\n", "──────────────────────────────────────────────────".dimmed());
    std::io::stdout().flush().ok();
}
