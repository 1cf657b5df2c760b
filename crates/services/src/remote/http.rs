use std::env;
use std::time::Duration;

use async_trait::async_trait;
use doric_core::model::{StepProgress, UserId};
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use super::{PROGRESS_COLLECTION, ProgressDocument, RemoteProgressStore, USERS_COLLECTION};
use crate::error::{ConfigError, RemoteError};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
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
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `DORIC_REMOTE_URL`, `DORIC_REMOTE_TOKEN`, and
    /// `DORIC_REMOTE_TIMEOUT_SECS`. Returns `Ok(None)` when no URL is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a set variable is malformed.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_env_with_url(None)
    }

    /// Same as [`from_env`](Self::from_env), but `base_url` wins over
    /// `DORIC_REMOTE_URL` when given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL or a set variable is malformed.
    pub fn from_env_with_url(base_url: Option<&str>) -> Result<Option<Self>, ConfigError> {
        let Some(raw) = base_url
            .map(str::to_owned)
            .or_else(|| env::var("DORIC_REMOTE_URL").ok())
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let mut config = Self::new(&raw)?;
        if let Some(token) = env::var("DORIC_REMOTE_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            config = config.with_token(token);
        }
        if let Ok(raw) = env::var("DORIC_REMOTE_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                var: "DORIC_REMOTE_TIMEOUT_SECS",
                raw: raw.clone(),
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(Some(config))
    }

    #[must_use]
    pub fn document_url(&self, user_id: &UserId) -> String {
        self.collection_url(PROGRESS_COLLECTION, user_id)
    }

    #[must_use]
    pub fn collection_url(&self, collection: &str, user_id: &UserId) -> String {
        format!(
            "{}/{collection}/{user_id}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

/// Remote progress store reached over HTTP with JSON bodies.
///
/// Without a config every call fails with `RemoteError::Unconfigured`, so the
/// orchestrator keeps queueing locally.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    config: Option<RemoteConfig>,
}

impl HttpRemoteStore {
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built, for
    /// example when the TLS backend fails to initialise.
    pub fn new(config: Option<RemoteConfig>) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(config) = &config {
            builder = builder.timeout(config.timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn request(
        &self,
        method: reqwest::Method,
        collection: &str,
        user_id: &UserId,
    ) -> Result<RequestBuilder, RemoteError> {
        let config = self.config.as_ref().ok_or(RemoteError::Unconfigured)?;
        let mut builder = self
            .client
            .request(method, config.collection_url(collection, user_id));
        if let Some(token) = &config.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }
}

#[async_trait]
impl RemoteProgressStore for HttpRemoteStore {
    async fn push_progress(
        &self,
        user_id: &UserId,
        progress: StepProgress,
    ) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::PATCH, PROGRESS_COLLECTION, user_id)?
            .json(&ProgressDocument::from(progress))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        Ok(())
    }

    async fn fetch_progress(&self, user_id: &UserId) -> Result<Option<StepProgress>, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, PROGRESS_COLLECTION, user_id)?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let doc: ProgressDocument = response.json().await?;
        Ok(Some(doc.into()))
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.delete_document(PROGRESS_COLLECTION, user_id).await
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.delete_document(USERS_COLLECTION, user_id).await
    }
}

impl HttpRemoteStore {
    async fn delete_document(&self, collection: &str, user_id: &UserId) -> Result<(), RemoteError> {
        let response = self
            .request(reqwest::Method::DELETE, collection, user_id)?
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(RemoteError::HttpStatus(status))
    }
}
