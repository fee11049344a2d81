pub mod core;
pub mod error;
pub mod http;
pub mod modules;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::core::classifier::{is_interesting, BaselineSnapshot, Classification};
pub use crate::core::control::RunControl;
pub use crate::core::engine::{
    resolve_headers, send_once, FilterVerdict, Fuzzer, ResponseFilters, RunReport, RunStats, RunStatus,
};
pub use crate::core::generator::{Assignment, Combination, CombinationGenerator, ParameterSet, SubstitutionTuple};
pub use crate::core::result_aggregator::{DispatchOutcome, Finding, FindingAggregator};
pub use crate::core::template::RequestTemplate;
pub use crate::core::{token_for, FuzzMode, SENTINEL_VALUE};
pub use crate::error::{ConfigError, FuzzError, TransportError};
pub use crate::http::{HttpClient, HttpRequest, PreparedRequest, ResponseSnapshot, Transport};
pub use crate::modules::endpoints::{EndpointCatalog, EndpointDescriptor, ParamLocation};
pub use crate::modules::reporting::{renderer_for, HtmlReport, JsonReport, ReportContext, ReportRenderer};
pub use crate::modules::traffic_log::{format_response, FileTrafficLog, InterestingStore, TrafficLog};
pub use crate::utils::wordlist::Wordlist;
pub use crate::utils::{parse_custom_headers, parse_status_list};

/// Run options shared by every front end.
///
/// Front ends build exactly one of these, either field by field or from a
/// JSON file, and hand it to [`Fuzzer`] unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuzzOptions {
    pub delay_seconds: f64,
    pub proxy: Option<String>,
    /// Full `Authorization` header value, e.g. `Bearer <token>`.
    pub auth_header: Option<String>,
    /// Applied last, so these win over every other header source.
    pub custom_headers: Option<Vec<(String, String)>>,
    pub include_regex: Option<String>,
    pub status_allow_list: Option<Vec<u16>>,
    pub status_deny_list: Option<Vec<u16>>,
    pub save_interesting: bool,
    pub save_request_log: bool,
    pub save_response_log: bool,
    pub report_destination: Option<String>,
    pub results_dir: String,
    pub concurrency: usize,
    pub timeout_seconds: u64,
}

impl Default for FuzzOptions {
    fn default() -> Self {
        Self {
            delay_seconds: crate::core::throttle::DEFAULT_DELAY_SECONDS,
            proxy: None,
            auth_header: None,
            custom_headers: None,
            include_regex: None,
            status_allow_list: None,
            status_deny_list: None,
            save_interesting: false,
            save_request_log: false,
            save_response_log: false,
            report_destination: None,
            results_dir: "results".to_string(),
            concurrency: 1,
            timeout_seconds: 10,
        }
    }
}

impl FuzzOptions {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidConfigFile {
            path: path.to_string(),
            reason,
        };
        let data = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| invalid(e.to_string()))
    }

    pub fn proxy_ref(&self) -> Option<&str> {
        self.proxy.as_deref().filter(|p| !p.is_empty())
    }

    pub fn writes_traffic_log(&self) -> bool {
        self.save_request_log || self.save_response_log
    }
}

/// One iteration as seen by an event sink.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub index: usize,
    pub total: usize,
    pub tuple: &'a SubstitutionTuple,
}

/// Output abstraction for a run.
/// The CLI implements this on the terminal; tests and embedders may discard it.
pub trait FuzzEventSink: Send + Sync {
    fn on_log(&self, level: &str, message: &str);
    fn on_start(&self, total: usize, mode: FuzzMode);
    fn on_attempt(&self, progress: &Progress<'_>);
    fn on_response(&self, progress: &Progress<'_>, response: &ResponseSnapshot);
    fn on_transport_error(&self, progress: &Progress<'_>, error: &TransportError);
    /// A surviving response whose status was explicitly allow-listed.
    fn on_allow_listed(&self, finding: &Finding);
    fn on_interesting(&self, finding: &Finding);
    fn on_finish(&self, report: &RunReport);
}

pub type SinkRef = Arc<dyn FuzzEventSink>;

/// Sink that drops every event.
pub struct NullSink;

impl NullSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self)
    }
}

impl FuzzEventSink for NullSink {
    fn on_log(&self, _level: &str, _message: &str) {}
    fn on_start(&self, _total: usize, _mode: FuzzMode) {}
    fn on_attempt(&self, _progress: &Progress<'_>) {}
    fn on_response(&self, _progress: &Progress<'_>, _response: &ResponseSnapshot) {}
    fn on_transport_error(&self, _progress: &Progress<'_>, _error: &TransportError) {}
    fn on_allow_listed(&self, _finding: &Finding) {}
    fn on_interesting(&self, _finding: &Finding) {}
    fn on_finish(&self, _report: &RunReport) {}
}

/// Terminal output sink for CLI usage.
///
/// The per-iteration status line lives in an `indicatif` bar and is overwritten
/// in place; everything else is printed above it and stays.
pub struct ConsoleSink {
    bar: indicatif::ProgressBar,
}

impl ConsoleSink {
    pub fn new_ref() -> SinkRef {
        let bar = indicatif::ProgressBar::hidden();
        Arc::new(Self { bar })
    }

    fn persist(&self, line: String) {
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }
}

impl FuzzEventSink for ConsoleSink {
    fn on_log(&self, level: &str, message: &str) {
        use colored::*;
        let colored = match level {
            "success" => message.green().to_string(),
            "error" => message.red().to_string(),
            "warn" => message.yellow().to_string(),
            "phase" => message.bright_cyan().bold().to_string(),
            _ => message.to_string(),
        };
        self.persist(colored);
    }

    fn on_start(&self, total: usize, mode: FuzzMode) {
        use indicatif::{ProgressDrawTarget, ProgressStyle};
        self.bar.set_length(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{prefix:.cyan} {msg}") {
            self.bar.set_style(style);
        }
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.persist(format!("[*] Running in {} mode: {} request(s)", mode, total));
    }

    fn on_attempt(&self, progress: &Progress<'_>) {
        self.bar.set_position(progress.index as u64);
        self.bar.set_prefix(format!("[*] Request {}/{}", progress.index, progress.total));
        self.bar.set_message(format!(
            "| Param: {} | Payload: '{}'",
            progress.tuple.param_label(),
            progress.tuple.payload_label()
        ));
    }

    fn on_response(&self, progress: &Progress<'_>, response: &ResponseSnapshot) {
        self.bar.set_prefix(format!("[*] Request {}/{}", progress.index, progress.total));
        self.bar.set_message(format!(
            "| Status: {} | Length: {} | Param: {} | Payload: '{}'",
            response.status,
            response.length(),
            progress.tuple.param_label(),
            progress.tuple.payload_label()
        ));
    }

    fn on_transport_error(&self, progress: &Progress<'_>, error: &TransportError) {
        use colored::*;
        self.persist(
            format!(
                "[-] Error sending request {}/{} payload '{}': {}",
                progress.index,
                progress.total,
                progress.tuple.payload_label(),
                error
            )
            .red()
            .to_string(),
        );
    }

    fn on_allow_listed(&self, finding: &Finding) {
        use colored::*;
        let response = &finding.outcome.response;
        self.persist(format!("{}", format!("[*] Response Status: {}", response.status).cyan()));
        self.persist(format!("{}", format!("[*] Response Length: {}", response.length()).cyan()));
        self.persist(format!("{}\n", response.body.dimmed()));
    }

    fn on_interesting(&self, finding: &Finding) {
        use colored::*;
        let response = &finding.outcome.response;
        let headline = if finding.tuple.active().count() > 1 {
            format!("[+] Interesting COMBO response | Param Values: {}", finding.tuple.payload_label())
        } else {
            format!(
                "[+] Interesting response for param '{}' payload '{}'",
                finding.tuple.param_label(),
                finding.tuple.payload_label()
            )
        };
        self.persist(headline.green().bold().to_string());
        self.persist(format!("    Status: {}, Length: {}\n", response.status, response.length()));
    }

    fn on_finish(&self, report: &RunReport) {
        use colored::*;
        self.bar.finish_and_clear();
        let line = match report.status {
            RunStatus::Completed => format!(
                "[+] Fuzzing completed: {} finding(s), {} interesting, {} error(s)",
                report.findings.len(),
                report.stats.interesting,
                report.stats.transport_errors
            )
            .green()
            .to_string(),
            RunStatus::Stopped { .. } => format!(
                "[!] Fuzzing {}: {} finding(s) kept",
                report.status,
                report.findings.len()
            )
            .yellow()
            .to_string(),
        };
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = FuzzOptions::default();
        assert_eq!(options.delay_seconds, 0.1);
        assert_eq!(options.results_dir, "results");
        assert_eq!(options.concurrency, 1);
        assert!(options.proxy_ref().is_none());
        assert!(!options.writes_traffic_log());
    }

    #[test]
    fn test_options_from_camel_case_json_with_defaults() {
        let json = r#"{
            "delaySeconds": 0,
            "authHeader": "Bearer abc",
            "customHeaders": [["X-Trace", "1"]],
            "statusDenyList": [404],
            "saveRequestLog": true
        }"#;
        let options: FuzzOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.delay_seconds, 0.0);
        assert_eq!(options.auth_header.as_deref(), Some("Bearer abc"));
        assert_eq!(options.custom_headers, Some(vec![("X-Trace".to_string(), "1".to_string())]));
        assert_eq!(options.status_deny_list, Some(vec![404]));
        assert!(options.writes_traffic_log());
        assert_eq!(options.results_dir, "results");
    }

    #[test]
    fn test_options_from_file_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{ not json").unwrap();
        let err = FuzzOptions::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfigFile { .. }));
    }

    #[test]
    fn test_empty_proxy_counts_as_none() {
        let options = FuzzOptions {
            proxy: Some(String::new()),
            ..FuzzOptions::default()
        };
        assert!(options.proxy_ref().is_none());
    }
}
