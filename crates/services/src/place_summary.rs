//! Short encyclopedia summary of a place, shown on the about page.

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, RemoteError};

pub const DEFAULT_SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/";

/// Place the about page describes.
pub const REFERENCE_PLACE: &str = "Aberdeen";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct SummaryConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl SummaryConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` unless `base_url` is an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            raw: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                raw: base_url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        Ok(Self {
            base_url: parsed,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `DORIC_SUMMARY_URL`. Unset means the public Wikipedia REST API;
    /// set but blank turns summaries off.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the URL is malformed.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match env::var("DORIC_SUMMARY_URL") {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Self::new(&raw).map(Some),
            Err(_) => Self::new(DEFAULT_SUMMARY_URL).map(Some),
        }
    }

    /// `{base}/page/summary/{title}`, with the title percent-encoded as one
    /// path segment.
    #[must_use]
    pub fn summary_url(&self, title: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["page", "summary", title]);
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    extract: String,
}

/// Fetches page summaries over HTTP.
///
/// Without a config every fetch fails with `RemoteError::Unconfigured`.
#[derive(Clone)]
pub struct PlaceSummaryClient {
    client: Client,
    config: Option<SummaryConfig>,
}

impl PlaceSummaryClient {
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: Option<SummaryConfig>) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(config) = &config {
            builder = builder.timeout(config.timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// The plain-text extract of the page titled `title`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the client is unconfigured, the request fails,
    /// or the response is not a success.
    pub async fn fetch_summary(&self, title: &str) -> Result<String, RemoteError> {
        let config = self.config.as_ref().ok_or(RemoteError::Unconfigured)?;
        let response = self.client.get(config.summary_url(title)).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let summary: PageSummary = response.json().await?;
        Ok(summary.extract)
    }

    /// Like [`fetch_summary`](Self::fetch_summary), but any failure reads as
    /// an empty summary.
    pub async fn summary_or_empty(&self, title: &str) -> String {
        match self.fetch_summary(title).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::debug!(title, error = %err, "place summary unavailable");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_url_appends_encoded_title() {
        let config = SummaryConfig::new(DEFAULT_SUMMARY_URL).unwrap();
        assert_eq!(
            config.summary_url(REFERENCE_PLACE).as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Aberdeen"
        );
        assert_eq!(
            config.summary_url("Old Aberdeen").as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Old%20Aberdeen"
        );
    }

    #[test]
    fn summary_url_without_trailing_slash() {
        let config = SummaryConfig::new("http://localhost:8080/api").unwrap();
        assert_eq!(
            config.summary_url("Aberdeen").as_str(),
            "http://localhost:8080/api/page/summary/Aberdeen"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            SummaryConfig::new("file:///tmp"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn page_summary_reads_extract_only() {
        let page: PageSummary = serde_json::from_str(
            r#"{"title": "Aberdeen", "extract": "Aberdeen is a city in Scotland."}"#,
        )
        .unwrap();
        assert_eq!(page.extract, "Aberdeen is a city in Scotland.");
        let empty: PageSummary = serde_json::from_str("{}").unwrap();
        assert!(empty.extract.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_client_yields_empty_summary() {
        let client = PlaceSummaryClient::new(None).unwrap();
        assert!(!client.enabled());
        assert!(matches!(
            client.fetch_summary(REFERENCE_PLACE).await,
            Err(RemoteError::Unconfigured)
        ));
        assert_eq!(client.summary_or_empty(REFERENCE_PLACE).await, "");
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_empty_summary() {
        let config = SummaryConfig::new("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        let client = PlaceSummaryClient::new(Some(config)).unwrap();
        assert!(matches!(
            client.fetch_summary(REFERENCE_PLACE).await,
            Err(RemoteError::Http(_))
        ));
        assert_eq!(client.summary_or_empty(REFERENCE_PLACE).await, "");
    }
}
