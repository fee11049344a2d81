use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{future, stream, StreamExt};
use log::{debug, info, warn};
use regex::{Regex, RegexBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

use crate::core::classifier::BaselineSnapshot;
use crate::core::control::RunControl;
use crate::core::generator::{CombinationGenerator, ParameterSet, SubstitutionTuple};
use crate::core::result_aggregator::{DispatchOutcome, Finding, FindingAggregator};
use crate::core::template::RequestTemplate;
use crate::core::throttle::Throttle;
use crate::core::FuzzMode;
use crate::error::{ConfigError, FuzzError, TransportError};
use crate::http::{HttpClient, HttpRequest, PreparedRequest, ResponseSnapshot, Transport};
use crate::modules::reporting::{renderer_for, resolve_destination, ReportContext, ReportRenderer};
use crate::modules::traffic_log::{FileTrafficLog, InterestingStore, TrafficLog};
use crate::utils::wordlist::Wordlist;
use crate::{FuzzOptions, Progress, SinkRef};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum RunStatus {
    Completed,
    /// Cancellation was observed; `at` is the first iteration never dispatched.
    Stopped { at: usize, total: usize },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Stopped { at, total } => write!(f, "interrupted at {}/{}", at, total),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total: usize,
    /// Requests actually sent, excluding the baseline.
    pub dispatched: usize,
    pub transport_errors: usize,
    pub filtered: usize,
    pub interesting: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub baseline: BaselineSnapshot,
    /// Filter-surviving outcomes in enumeration order.
    pub findings: Vec<Finding>,
    pub stats: RunStats,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Keep,
    NoRegexMatch,
    NotAllowed,
    Denied,
}

/// Include-regex, then status allow-list, then status deny-list.
#[derive(Debug, Clone, Default)]
pub struct ResponseFilters {
    include: Option<Regex>,
    allow: Option<HashSet<u16>>,
    deny: Option<HashSet<u16>>,
}

impl ResponseFilters {
    pub fn new(options: &FuzzOptions) -> Result<Self, ConfigError> {
        let include = match options.include_regex.as_deref().filter(|p| !p.is_empty()) {
            Some(pattern) => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidRegex {
                        pattern: pattern.to_string(),
                        source,
                    })?,
            ),
            None => None,
        };
        let as_set = |list: &Option<Vec<u16>>| {
            list.as_ref()
                .filter(|l| !l.is_empty())
                .map(|l| l.iter().copied().collect::<HashSet<u16>>())
        };

        Ok(Self {
            include,
            allow: as_set(&options.status_allow_list),
            deny: as_set(&options.status_deny_list),
        })
    }

    pub fn check(&self, response: &ResponseSnapshot) -> FilterVerdict {
        if let Some(ref re) = self.include {
            if !re.is_match(&response.body) {
                return FilterVerdict::NoRegexMatch;
            }
        }
        if let Some(ref allow) = self.allow {
            if !allow.contains(&response.status) {
                return FilterVerdict::NotAllowed;
            }
        }
        if let Some(ref deny) = self.deny {
            if deny.contains(&response.status) {
                return FilterVerdict::Denied;
            }
        }
        FilterVerdict::Keep
    }

    pub fn has_allow_list(&self) -> bool {
        self.allow.is_some()
    }
}

/// Default content type, then the auth header, then template headers, then
/// custom headers; a later source replaces an earlier one with the same name.
pub fn resolve_headers(template: &RequestTemplate, options: &FuzzOptions) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut entries: Vec<(&str, &str)> = Vec::new();
    if let Some(auth) = options.auth_header.as_deref().filter(|a| !a.is_empty()) {
        entries.push(("Authorization", auth));
    }
    entries.extend(template.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if let Some(ref custom) = options.custom_headers {
        entries.extend(custom.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    for (key, value) in entries {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(key.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::InvalidHeader(format!("{}: {}", key, value)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn build_request(method: &Method, url: &str, headers: &HeaderMap, body: String) -> Result<HttpRequest, TransportError> {
    let parsed = Url::parse(url).map_err(|source| TransportError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    Ok(HttpRequest::new(method.clone(), parsed, headers.clone(), body))
}

/// Sends the template once with no substitution. Used when an endpoint is
/// resolved with every parameter given a static value.
pub async fn send_once(
    template: &RequestTemplate,
    options: &FuzzOptions,
) -> anyhow::Result<(PreparedRequest, ResponseSnapshot)> {
    let client = HttpClient::new(options.timeout_seconds, options.proxy_ref())?;
    let method = Method::from_bytes(template.method.as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(template.method.clone()))?;
    let headers = resolve_headers(template, options)?;
    let request = build_request(&method, &template.url, &headers, template.body.clone())?;
    let response = client.send(&request).await?;
    Ok((request.to_record(), response))
}

/// What every in-flight iteration needs, shared across the dispatch stream.
struct SendContext {
    transport: Arc<dyn Transport>,
    template: Arc<RequestTemplate>,
    method: Method,
    headers: HeaderMap,
}

impl SendContext {
    async fn send(&self, tuple: &SubstitutionTuple) -> Result<(PreparedRequest, ResponseSnapshot), TransportError> {
        let (url, body) = self.template.substitute(tuple);
        let request = build_request(&self.method, &url, &self.headers, body)?;
        let response = self.transport.send(&request).await?;
        Ok((request.to_record(), response))
    }
}

/// Parameter fuzzer for a single request template.
///
/// All configuration is validated in the constructor, so a `Fuzzer` that
/// exists will not fail for configuration reasons once `run` starts. The
/// only fatal error left is a baseline request that cannot be completed.
pub struct Fuzzer {
    template: Arc<RequestTemplate>,
    params: ParameterSet,
    wordlist: Arc<Wordlist>,
    options: FuzzOptions,
    method: Method,
    headers: HeaderMap,
    filters: ResponseFilters,
    throttle: Throttle,
    transport: Arc<dyn Transport>,
    traffic_log: Option<Box<dyn TrafficLog>>,
    renderer: Option<Box<dyn ReportRenderer>>,
}

impl Fuzzer {
    /// Creates a `Fuzzer` sending through a `reqwest` client built from the options.
    pub fn new(
        template: RequestTemplate,
        params: ParameterSet,
        wordlist: Wordlist,
        options: FuzzOptions,
    ) -> Result<Self, ConfigError> {
        let client = HttpClient::new(options.timeout_seconds, options.proxy_ref())?;
        Self::with_transport(template, params, wordlist, options, Arc::new(client))
    }

    pub fn with_transport(
        template: RequestTemplate,
        params: ParameterSet,
        wordlist: Wordlist,
        options: FuzzOptions,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let unused = template.unused_parameters(params.names());
        if !unused.is_empty() {
            return Err(ConfigError::UnusedParameters(
                unused.into_iter().map(str::to_string).collect(),
            ));
        }
        if wordlist.is_empty() {
            return Err(ConfigError::WordlistEmpty("<in-memory>".to_string()));
        }

        let method = Method::from_bytes(template.method.as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(template.method.clone()))?;
        let headers = resolve_headers(&template, &options)?;
        let filters = ResponseFilters::new(&options)?;
        let throttle = Throttle::from_seconds(options.delay_seconds)?;

        let wordlist = Arc::new(wordlist);
        // Rejects enumerations whose size does not fit before anything is sent.
        CombinationGenerator::new(&params, Arc::clone(&wordlist))?;

        Ok(Self {
            template: Arc::new(template),
            params,
            wordlist,
            options,
            method,
            headers,
            filters,
            throttle,
            transport,
            traffic_log: None,
            renderer: None,
        })
    }

    /// Replaces the file-backed traffic log the options would otherwise open.
    pub fn with_traffic_log(mut self, log: Box<dyn TrafficLog>) -> Self {
        self.traffic_log = Some(log);
        self
    }

    /// Replaces the extension-based renderer choice for the report destination.
    pub fn with_report_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn total(&self) -> usize {
        CombinationGenerator::new(&self.params, Arc::clone(&self.wordlist))
            .map(|g| g.total())
            .unwrap_or(0)
    }

    pub fn mode(&self) -> FuzzMode {
        self.params.mode()
    }

    /// Captures the baseline, runs every iteration until the enumeration is
    /// exhausted or `control` is cancelled, then hands the findings to the
    /// report renderer when a destination is configured.
    pub async fn run(mut self, control: RunControl, sink: SinkRef) -> Result<RunReport, FuzzError> {
        sink.on_log("phase", "[*] Sending baseline request...");
        let baseline_request = build_request(
            &self.method,
            &self.template.url,
            &self.headers,
            self.template.body.clone(),
        )
        .map_err(FuzzError::Baseline)?;
        let baseline_response = self
            .transport
            .send(&baseline_request)
            .await
            .map_err(FuzzError::Baseline)?;
        let baseline = BaselineSnapshot::from(&baseline_response);
        info!("Baseline status: {}, length: {}", baseline.status, baseline.length());
        sink.on_log(
            "info",
            &format!("[*] Baseline status: {}, length: {}", baseline.status, baseline.length()),
        );

        let results_dir = PathBuf::from(&self.options.results_dir);
        if self.traffic_log.is_none() && self.options.writes_traffic_log() {
            self.traffic_log = Some(Box::new(FileTrafficLog::open(
                &results_dir,
                self.options.save_request_log,
                self.options.save_response_log,
            )?));
        }
        let store = self
            .options
            .save_interesting
            .then(|| InterestingStore::new(&results_dir));

        let generator = CombinationGenerator::new(&self.params, Arc::clone(&self.wordlist))?;
        sink.on_start(generator.total(), self.params.mode());

        let (result_tx, result_rx) = mpsc::channel::<Finding>(100);
        let aggregator = FindingAggregator::run(result_rx, store, Arc::clone(&sink));
        let dispatch = self.dispatch(generator, &baseline, &control, result_tx, &sink);
        let ((status, stats), findings) = tokio::join!(dispatch, aggregator);

        if let RunStatus::Stopped { .. } = status {
            info!("Fuzzing {}", status);
            sink.on_log("warn", &format!("[STOPPING] Fuzzing {}", status));
        }

        let mut report = RunReport {
            status,
            baseline,
            findings,
            stats,
            report_path: None,
        };
        self.write_report(&mut report, &results_dir, &sink);

        sink.on_finish(&report);
        Ok(report)
    }

    async fn dispatch(
        &mut self,
        generator: CombinationGenerator,
        baseline: &BaselineSnapshot,
        control: &RunControl,
        result_tx: mpsc::Sender<Finding>,
        sink: &SinkRef,
    ) -> (RunStatus, RunStats) {
        let total = generator.total();
        let mode = self.params.mode();
        let throttle = self.throttle;
        let context = Arc::new(SendContext {
            transport: Arc::clone(&self.transport),
            template: Arc::clone(&self.template),
            method: self.method.clone(),
            headers: self.headers.clone(),
        });

        let gate = control.clone();
        let delay_gate = control.clone();
        let attempt_sink = Arc::clone(sink);
        let sent = Arc::new(AtomicUsize::new(0));
        let sent_counter = Arc::clone(&sent);

        let mut outcomes = stream::iter(generator)
            .take_while(move |_| future::ready(!gate.is_cancelled()))
            .map(move |combo| {
                let context = Arc::clone(&context);
                let sink = Arc::clone(&attempt_sink);
                let delay_gate = delay_gate.clone();
                let sent = Arc::clone(&sent_counter);
                async move {
                    sent.fetch_add(1, Ordering::SeqCst);
                    sink.on_attempt(&Progress {
                        index: combo.index,
                        total,
                        tuple: &combo.tuple,
                    });
                    let result = context.send(&combo.tuple).await;
                    if !delay_gate.is_cancelled() {
                        throttle.wait().await;
                    }
                    (combo, result)
                }
            })
            .buffered(self.options.concurrency.max(1));

        let mut stats = RunStats {
            total,
            ..RunStats::default()
        };
        let mut last_index = 0;
        let mut logged = 0;

        // Every outcome yielded here was dispatched before cancellation was
        // observed by the gate, so it is processed in full.
        while let Some((combo, result)) = outcomes.next().await {
            last_index = combo.index;
            let progress = Progress {
                index: combo.index,
                total,
                tuple: &combo.tuple,
            };

            let (request, response) = match result {
                Ok(exchange) => exchange,
                Err(e) => {
                    warn!(
                        "Request {}/{} payload '{}' failed: {}",
                        combo.index,
                        total,
                        combo.tuple.payload_label(),
                        e
                    );
                    sink.on_transport_error(&progress, &e);
                    stats.transport_errors += 1;
                    continue;
                }
            };

            let verdict = self.filters.check(&response);
            if verdict != FilterVerdict::Keep {
                debug!("Request {}/{} discarded: {:?}", combo.index, total, verdict);
                stats.filtered += 1;
                continue;
            }

            if let Some(log) = self.traffic_log.as_mut() {
                logged += 1;
                if let Err(e) = log.record(logged, &request, &response) {
                    warn!("Failed to write traffic log entry {}: {}", logged, e);
                }
            }

            sink.on_response(&progress, &response);

            let excluded = match mode {
                FuzzMode::Independent => combo.tuple.active().next().map(|a| a.name.as_str()),
                FuzzMode::Combinatorial => None,
            };
            let classification = baseline.classify(&response, excluded);

            let finding = Finding {
                index: combo.index,
                tuple: combo.tuple,
                outcome: DispatchOutcome {
                    request,
                    response,
                    classification,
                },
            };

            if self.filters.has_allow_list() {
                sink.on_allow_listed(&finding);
            }
            if finding.is_interesting() {
                stats.interesting += 1;
                sink.on_interesting(&finding);
            }

            if result_tx.send(finding).await.is_err() {
                warn!("Finding aggregator closed early; stopping dispatch");
                break;
            }
        }

        stats.dispatched = sent.load(Ordering::SeqCst);
        let status = if last_index < total && control.is_cancelled() {
            RunStatus::Stopped {
                at: last_index + 1,
                total,
            }
        } else {
            RunStatus::Completed
        };
        (status, stats)
    }

    fn write_report(&mut self, report: &mut RunReport, results_dir: &Path, sink: &SinkRef) {
        let destination = match self.options.report_destination.as_deref().filter(|d| !d.is_empty()) {
            Some(d) => d,
            None => return,
        };
        if report.findings.is_empty() {
            sink.on_log("info", "[*] No findings collected; report not written.");
            return;
        }

        let path = resolve_destination(results_dir, destination);
        let context = ReportContext {
            method: self.template.method.clone(),
            url_template: self.template.url.clone(),
            mode: self.params.mode(),
            status: report.status.to_string(),
            baseline_status: report.baseline.status,
            baseline_length: report.baseline.length(),
            generated_at: now_epoch(),
        };
        let renderer = self.renderer.take().unwrap_or_else(|| renderer_for(&path));

        match renderer.render(&report.findings, &context, &path) {
            Ok(()) => {
                sink.on_log("success", &format!("[+] Report generated: {}", path.display()));
                report.report_path = Some(path);
            }
            Err(e) => sink.on_log("error", &format!("[!] Failed to write report: {:#}", e)),
        }
    }
}

fn now_epoch() -> String {
    use std::time::SystemTime;
    let dur = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}s since epoch", dur.as_secs())
}
