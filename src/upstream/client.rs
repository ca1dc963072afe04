use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::types::ResultSet;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_ERROR_SNIPPET: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamFailure {
    #[error("upstream timed out after {0}ms")]
    Timeout(u128),

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("upstream error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("invalid upstream payload: {0}")]
    Decode(String),

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl UpstreamFailure {
    /// HTTP status reported to the caller for this failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::Timeout(_) => 504,
            Self::Network(_) | Self::Decode(_) => 502,
            Self::Api { code, .. } => *code,
            Self::InvalidUrl(_) => 500,
        }
    }

    /// Message reported to the caller: the upstream's own message when it
    /// sent one, otherwise the failure description.
    pub fn message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Transport to one upstream search service.
/// Implemented by `HttpUpstream` for production; mock implementations used in tests.
pub trait UpstreamClient {
    async fn fetch(&self, endpoint: &Url) -> Result<ResultSet, UpstreamFailure>;
}

#[derive(Clone)]
pub struct HttpUpstream {
    http: Client,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;
        Ok(Self { http, timeout })
    }

    fn classify(&self, e: reqwest::Error) -> UpstreamFailure {
        if e.is_timeout() {
            UpstreamFailure::Timeout(self.timeout.as_millis())
        } else if e.is_decode() {
            UpstreamFailure::Decode(e.to_string())
        } else {
            UpstreamFailure::Network(e)
        }
    }
}

impl UpstreamClient for HttpUpstream {
    async fn fetch(&self, endpoint: &Url) -> Result<ResultSet, UpstreamFailure> {
        let response = self
            .http
            .get(endpoint.clone())
            .header("User-Agent", crate::USER_AGENT)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, host = endpoint.host_str().unwrap_or(""), "upstream error");
            return Err(UpstreamFailure::Api {
                code: status.as_u16(),
                message: extract_error_message(&text, status),
            });
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        let set: ResultSet =
            serde_json::from_str(&text).map_err(|e| UpstreamFailure::Decode(e.to_string()))?;
        debug!(results = set.results.len(), "upstream payload received");
        Ok(set)
    }
}

fn extract_error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.chars().take(MAX_ERROR_SNIPPET).collect()
            }
        })
}

/// Upstream URL for one query: the configured base plus `query` and `nr`.
pub fn endpoint(base: &str, query: &str, nr: usize) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("query", query)
        .append_pair("nr", &nr.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_query_and_count() {
        let url = endpoint("https://esqs.example.com/api/v1/search?lang=en", "rust async", 12).unwrap();
        assert_eq!(
            url.as_str(),
            "https://esqs.example.com/api/v1/search?lang=en&query=rust+async&nr=12"
        );
    }

    #[test]
    fn endpoint_rejects_relative_base() {
        assert!(endpoint("/api/search", "q", 1).is_err());
    }

    #[test]
    fn failure_statuses() {
        assert_eq!(UpstreamFailure::Timeout(100).status(), 504);
        assert_eq!(UpstreamFailure::Decode("x".into()).status(), 502);
        assert_eq!(
            UpstreamFailure::Api {
                code: 429,
                message: "slow down".into()
            }
            .status(),
            429
        );
    }

    #[test]
    fn failure_message_passes_upstream_text_through() {
        let api = UpstreamFailure::Api {
            code: 503,
            message: "maintenance".into(),
        };
        assert_eq!(api.message(), "maintenance");
        assert_eq!(UpstreamFailure::Timeout(250).message(), "upstream timed out after 250ms");
    }

    #[test]
    fn error_message_prefers_json_message() {
        let status = reqwest::StatusCode::BAD_GATEWAY;
        assert_eq!(extract_error_message(r#"{"message":"index offline"}"#, status), "index offline");
        assert_eq!(extract_error_message("plain failure", status), "plain failure");
        assert_eq!(extract_error_message("", status), "HTTP 502 Bad Gateway");
    }
}
