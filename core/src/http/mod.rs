pub mod client;

pub use client::HttpClient;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use url::Url;

use crate::error::TransportError;

/// A concrete request ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: String) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// Plain copy of the request for logs and reports.
    pub fn to_record(&self) -> PreparedRequest {
        PreparedRequest {
            method: self.method.to_string(),
            url: self.url.to_string(),
            headers: headers_to_vec(&self.headers),
            body: self.body.clone(),
        }
    }
}

/// The request as it went out on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl PreparedRequest {
    pub fn request_line(&self) -> String {
        format!("{} {} HTTP/1.1", self.method, self.url)
    }
}

/// Everything kept from a response once its body has been read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub reason: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponseSnapshot {
    /// Minimal HTTP/1.1 snapshot, mainly for hand-built responses.
    pub fn new(status: u16, body: &str) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self {
            status,
            reason,
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status_line(&self) -> String {
        format!("{} {} {}", self.version, self.status, self.reason)
    }

    /// Body length in characters.
    pub fn length(&self) -> usize {
        self.body.chars().count()
    }
}

/// Sends one request and captures the whole response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<ResponseSnapshot, TransportError>;
}

pub fn headers_to_vec(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect()
}
