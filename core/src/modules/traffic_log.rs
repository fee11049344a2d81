//! Append-only artifacts written during a run: the raw request/response logs
//! and standalone copies of interesting responses.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::core::result_aggregator::Finding;
use crate::http::{PreparedRequest, ResponseSnapshot};

pub const REQUEST_LOG_FILE: &str = "requests.txt";
pub const RESPONSE_LOG_FILE: &str = "responses.txt";

/// Sink for numbered raw traffic blocks.
pub trait TrafficLog: Send {
    fn record(&mut self, number: usize, request: &PreparedRequest, response: &ResponseSnapshot) -> io::Result<()>;
}

/// `==== REQUEST n ====` / `==== RESPONSE n ====` blocks appended to two files.
pub struct FileTrafficLog {
    requests: Option<File>,
    responses: Option<File>,
}

impl FileTrafficLog {
    /// Opens (creating if needed) whichever of the two logs is requested under `dir`.
    pub fn open(dir: &Path, save_requests: bool, save_responses: bool) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let open = |name: &str| OpenOptions::new().create(true).append(true).open(dir.join(name));
        Ok(Self {
            requests: if save_requests { Some(open(REQUEST_LOG_FILE)?) } else { None },
            responses: if save_responses { Some(open(RESPONSE_LOG_FILE)?) } else { None },
        })
    }
}

impl TrafficLog for FileTrafficLog {
    fn record(&mut self, number: usize, request: &PreparedRequest, response: &ResponseSnapshot) -> io::Result<()> {
        if let Some(file) = self.requests.as_mut() {
            file.write_all(format_request_block(number, request).as_bytes())?;
        }
        if let Some(file) = self.responses.as_mut() {
            file.write_all(format_response_block(number, response).as_bytes())?;
        }
        Ok(())
    }
}

pub fn format_request_block(number: usize, request: &PreparedRequest) -> String {
    let mut block = format!("==== REQUEST {} ====\n{}\n", number, request.request_line());
    for (key, value) in &request.headers {
        block.push_str(&format!("{}: {}\n", key, value));
    }
    block.push('\n');
    block.push_str(&request.body);
    block.push_str("\n\n");
    block
}

pub fn format_response_block(number: usize, response: &ResponseSnapshot) -> String {
    format!("==== RESPONSE {} ====\n{}\n\n", number, format_response(response))
}

/// Status line, header lines, blank line, body.
pub fn format_response(response: &ResponseSnapshot) -> String {
    let mut out = format!("{}\n", response.status_line());
    for (key, value) in &response.headers {
        out.push_str(&format!("{}: {}\n", key, value));
    }
    out.push('\n');
    out.push_str(&response.body);
    out
}

/// Writes one file per interesting finding into the results directory.
#[derive(Debug, Clone)]
pub struct InterestingStore {
    dir: PathBuf,
}

impl InterestingStore {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn save(&self, finding: &Finding) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(finding.artifact_file_name());
        fs::write(&path, format_response(&finding.outcome.response))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PreparedRequest {
        PreparedRequest {
            method: "POST".to_string(),
            url: "http://x/users/7".to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: r#"{"id":"7"}"#.to_string(),
        }
    }

    fn response() -> ResponseSnapshot {
        let mut response = ResponseSnapshot::new(201, "created");
        response.headers.push(("server".to_string(), "mock".to_string()));
        response
    }

    #[test]
    fn test_request_block_layout() {
        assert_eq!(
            format_request_block(3, &request()),
            "==== REQUEST 3 ====\nPOST http://x/users/7 HTTP/1.1\ncontent-type: application/json\n\n{\"id\":\"7\"}\n\n"
        );
    }

    #[test]
    fn test_response_block_layout() {
        assert_eq!(
            format_response_block(3, &response()),
            "==== RESPONSE 3 ====\nHTTP/1.1 201 Created\nserver: mock\n\ncreated\n\n"
        );
    }

    #[test]
    fn test_file_log_appends_only_requested_sides() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = FileTrafficLog::open(dir.path(), true, false).unwrap();
            log.record(1, &request(), &response()).unwrap();
            log.record(2, &request(), &response()).unwrap();
        }
        {
            let mut log = FileTrafficLog::open(dir.path(), true, false).unwrap();
            log.record(1, &request(), &response()).unwrap();
        }
        let requests = fs::read_to_string(dir.path().join(REQUEST_LOG_FILE)).unwrap();
        assert_eq!(requests.matches("==== REQUEST").count(), 3);
        assert!(requests.contains("==== REQUEST 2 ===="));
        assert!(!dir.path().join(RESPONSE_LOG_FILE).exists());
    }
}
