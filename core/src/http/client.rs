use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Proxy};
use std::time::Duration;

use super::{headers_to_vec, HttpRequest, ResponseSnapshot, Transport};
use crate::error::{ConfigError, TransportError};

/// `reqwest`-backed transport with a fixed timeout and at most one proxy.
pub struct HttpClient {
    inner: Client,
    default_timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout_seconds: u64, proxy_url: Option<&str>) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(timeout_seconds);

        let mut builder = ClientBuilder::new()
            .timeout(timeout)
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = proxy_url {
            let p = Proxy::all(proxy).map_err(|_| ConfigError::InvalidProxy(proxy.to_string()))?;
            builder = builder.proxy(p);
        }

        let inner = builder
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            inner,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, req: &HttpRequest) -> Result<ResponseSnapshot, TransportError> {
        let mut builder = self
            .inner
            .request(req.method.clone(), req.url.as_str())
            .headers(req.headers.clone())
            .timeout(self.default_timeout);

        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let version = format!("{:?}", response.version());
        let headers = headers_to_vec(response.headers());
        let body = response.text().await?;

        Ok(ResponseSnapshot {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            version,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_without_proxy() {
        assert!(HttpClient::new(5, None).is_ok());
    }

    #[test]
    fn test_client_with_proxy() {
        assert!(HttpClient::new(5, Some("http://127.0.0.1:8080")).is_ok());
    }

    #[test]
    fn test_unparsable_proxy_is_config_error() {
        let err = HttpClient::new(5, Some("not a proxy url")).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidProxy(p) if p == "not a proxy url"));
    }
}
