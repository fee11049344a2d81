//! Self-contained report renderers for a run's findings.
//!
//! The HTML report is a single file with embedded CSS: one block per finding,
//! request and response side by side. The JSON report is the finding list as-is.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::core::result_aggregator::Finding;
use crate::core::FuzzMode;

/// Response bodies in the HTML report are cut to this many characters.
pub const REPORT_BODY_LIMIT: usize = 1000;

/// Run-level details printed in the report header.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext {
    pub method: String,
    pub url_template: String,
    pub mode: FuzzMode,
    pub status: String,
    pub baseline_status: u16,
    pub baseline_length: usize,
    pub generated_at: String,
}

pub trait ReportRenderer: Send + Sync {
    fn render(&self, findings: &[Finding], context: &ReportContext, destination: &Path) -> anyhow::Result<()>;
}

/// Picks the renderer from the destination extension: `.json` or HTML.
pub fn renderer_for(destination: &Path) -> Box<dyn ReportRenderer> {
    match destination.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Box::new(JsonReport),
        _ => Box::new(HtmlReport),
    }
}

/// A bare file name lands inside the results directory; any path with a
/// directory component is used as given.
pub fn resolve_destination(results_dir: &Path, destination: &str) -> PathBuf {
    let path = Path::new(destination);
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => path.to_path_buf(),
        _ => results_dir.join(path),
    }
}

fn write_report(destination: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory {}", parent.display()))?;
    }
    fs::write(destination, content)
        .with_context(|| format!("failed to write report {}", destination.display()))
}

pub struct JsonReport;

#[derive(Serialize)]
struct JsonDocument<'a> {
    context: &'a ReportContext,
    findings: &'a [Finding],
}

impl ReportRenderer for JsonReport {
    fn render(&self, findings: &[Finding], context: &ReportContext, destination: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&JsonDocument { context, findings })?;
        write_report(destination, &json)
    }
}

pub struct HtmlReport;

impl HtmlReport {
    pub fn generate(findings: &[Finding], context: &ReportContext) -> String {
        let interesting = findings.iter().filter(|f| f.is_interesting()).count();

        let mut blocks = String::new();
        for (i, finding) in findings.iter().enumerate() {
            let request = &finding.outcome.request;
            let response = &finding.outcome.response;
            let flag = if finding.is_interesting() {
                r#"<span class="flag">interesting</span>"#
            } else {
                ""
            };
            blocks.push_str(&format!(
                r#"<div class="finding{cls}">
    <h2>Packet {n} <span class="idx">#{index}</span> {flag}</h2>
    <p><strong>URL:</strong> {url}</p>
    <p><strong>Method:</strong> {method}</p>
    <p><strong>Param:</strong> {param}</p>
    <p><strong>Payload:</strong> <code>{payload}</code></p>
    <p><strong>Status:</strong> {status} {reason}</p>
    <p><strong>Length:</strong> {length}</p>
    <div class="req-resp">
        <div class="column">
            <h3>Request</h3>
            <pre>{method} {url}</pre>
            <p><strong>Headers:</strong></p>
            <pre>{req_headers}</pre>
            <p><strong>Body:</strong></p>
            <pre>{req_body}</pre>
        </div>
        <div class="column">
            <h3>Response</h3>
            <p><strong>Headers:</strong></p>
            <pre>{resp_headers}</pre>
            <p><strong>Body:</strong></p>
            <pre>{resp_body}</pre>
        </div>
    </div>
</div>
"#,
                cls = if finding.is_interesting() { " interesting" } else { "" },
                n = i + 1,
                index = finding.index,
                flag = flag,
                url = html_escape(&request.url),
                method = html_escape(&request.method),
                param = html_escape(&finding.tuple.param_label()),
                payload = html_escape(&finding.tuple.payload_label()),
                status = response.status,
                reason = html_escape(&response.reason),
                length = response.length(),
                req_headers = html_escape(&header_lines(&request.headers)),
                req_body = html_escape(&request.body),
                resp_headers = html_escape(&header_lines(&response.headers)),
                resp_body = html_escape(&truncate_chars(&response.body, REPORT_BODY_LIMIT)),
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>API Fuzzing Report</title>
<style>
body {{ font-family: Arial, sans-serif; background-color: #f8f8f8; padding: 20px; }}
h1 {{ color: #333; }}
.meta {{ color: #555; margin-bottom: 20px; }}
.finding {{ background-color: #fff; padding: 15px; margin-bottom: 20px; border-left: 5px solid #007acc; box-shadow: 0 0 10px rgba(0,0,0,0.1); }}
.finding.interesting {{ border-left-color: #e0a800; }}
.flag {{ background: #e0a800; color: #fff; font-size: 0.6em; padding: 2px 6px; border-radius: 3px; vertical-align: middle; }}
.idx {{ color: #999; font-size: 0.6em; }}
.req-resp {{ display: flex; gap: 20px; margin-top: 10px; }}
.column {{ flex: 1; background-color: #f0f0f0; padding: 10px; border-radius: 5px; font-family: monospace; font-size: 13px; overflow-x: auto; max-height: 500px; white-space: pre-wrap; word-wrap: break-word; }}
code {{ background-color: #eee; padding: 2px 4px; border-radius: 3px; }}
</style>
</head>
<body>
<h1>API Fuzzing Report</h1>
<div class="meta">
    <p>Generated on {generated}</p>
    <p><strong>Target:</strong> {method} {url}</p>
    <p><strong>Mode:</strong> {mode} | <strong>Run:</strong> {status}</p>
    <p><strong>Baseline:</strong> status {baseline_status}, length {baseline_length}</p>
    <p><strong>Findings:</strong> {total} ({interesting} interesting)</p>
</div>
{blocks}</body>
</html>
"#,
            generated = html_escape(&context.generated_at),
            method = html_escape(&context.method),
            url = html_escape(&context.url_template),
            mode = context.mode,
            status = html_escape(&context.status),
            baseline_status = context.baseline_status,
            baseline_length = context.baseline_length,
            total = findings.len(),
            interesting = interesting,
            blocks = blocks,
        )
    }
}

impl ReportRenderer for HtmlReport {
    fn render(&self, findings: &[Finding], context: &ReportContext, destination: &Path) -> anyhow::Result<()> {
        write_report(destination, &Self::generate(findings, context))
    }
}

fn header_lines(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Classification;
    use crate::core::generator::{Assignment, SubstitutionTuple};
    use crate::core::result_aggregator::DispatchOutcome;
    use crate::http::{PreparedRequest, ResponseSnapshot};

    fn context() -> ReportContext {
        ReportContext {
            method: "POST".to_string(),
            url_template: "http://x/<<FUZZ_id>>".to_string(),
            mode: FuzzMode::Independent,
            status: "completed".to_string(),
            baseline_status: 200,
            baseline_length: 2,
            generated_at: "1700000000s".to_string(),
        }
    }

    fn finding(index: usize, payload: &str, body: &str) -> Finding {
        Finding {
            index,
            tuple: SubstitutionTuple::new(vec![Assignment::active("id", payload)]),
            outcome: DispatchOutcome {
                request: PreparedRequest {
                    method: "POST".to_string(),
                    url: format!("http://x/{}", payload),
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                    body: String::new(),
                },
                response: ResponseSnapshot::new(500, body),
                classification: Classification { status_changed: true, body_changed: false },
            },
        }
    }

    #[test]
    fn test_html_has_one_block_per_finding_and_escapes() {
        let findings = vec![finding(1, "<script>", "boom"), finding(4, "2", "ok")];
        let html = HtmlReport::generate(&findings, &context());
        assert_eq!(html.matches("<div class=\"finding").count(), 2);
        assert!(html.contains("<code>&lt;script&gt;</code>"));
        assert!(!html.contains("<code><script>"));
        assert!(html.contains("500 Internal Server Error"));
        assert!(html.contains("#4"));
        assert!(html.contains("content-type: application/json"));
    }

    #[test]
    fn test_html_truncates_response_body() {
        let long = "a".repeat(REPORT_BODY_LIMIT + 50);
        let html = HtmlReport::generate(&[finding(1, "1", &long)], &context());
        assert!(html.contains(&"a".repeat(REPORT_BODY_LIMIT)));
        assert!(!html.contains(&"a".repeat(REPORT_BODY_LIMIT + 1)));
    }

    #[test]
    fn test_renderer_selection_and_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.JSON");
        renderer_for(&path)
            .render(&[finding(2, "7", "{}")], &context(), &path)
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["findings"][0]["index"], 2);
        assert_eq!(value["context"]["mode"], "independent");
    }

    #[test]
    fn test_resolve_destination() {
        let results = Path::new("results");
        assert_eq!(resolve_destination(results, "report.html"), PathBuf::from("results/report.html"));
        assert_eq!(resolve_destination(results, "out/report.html"), PathBuf::from("out/report.html"));
    }
}
