//! Endpoint configuration read from the environment

use std::time::Duration;

use thiserror::Error;

/// Inference service used when `SURVEYOR_API_URL` is unset
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteConfigError {
    #[error("{var} is not an http(s) URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("SURVEYOR_HTTP_TIMEOUT_SECS must be a whole number of seconds, got {0}")]
    InvalidTimeout(String),

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Base URL of the inference service
    pub api_url: String,
    /// Base URL of the hosted store, without `/rest/v1`
    pub store_url: Option<String>,
    /// Public API key sent as `apikey`
    pub store_key: Option<String>,
    /// No timeout unless configured
    pub timeout: Option<Duration>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            store_url: None,
            store_key: None,
            timeout: None,
        }
    }
}

impl RemoteConfig {
    /// Load from `SURVEYOR_*` environment variables
    pub fn from_env() -> Result<Self, RemoteConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RemoteConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_url = match non_empty("SURVEYOR_API_URL") {
            Some(url) => normalize_url("SURVEYOR_API_URL", &url)?,
            None => DEFAULT_API_URL.to_string(),
        };
        let store_url = non_empty("SURVEYOR_STORE_URL")
            .map(|url| normalize_url("SURVEYOR_STORE_URL", &url))
            .transpose()?;
        let timeout = non_empty("SURVEYOR_HTTP_TIMEOUT_SECS")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| RemoteConfigError::InvalidTimeout(raw))
            })
            .transpose()?;

        Ok(Self {
            api_url,
            store_url,
            store_key: non_empty("SURVEYOR_STORE_KEY"),
            timeout,
        })
    }

    pub fn with_api_url(mut self, url: &str) -> Result<Self, RemoteConfigError> {
        self.api_url = normalize_url("api url", url)?;
        Ok(self)
    }

    pub fn with_store(mut self, url: &str, key: impl Into<String>) -> Result<Self, RemoteConfigError> {
        self.store_url = Some(normalize_url("store url", url)?);
        self.store_key = Some(key.into());
        Ok(self)
    }

    /// Store URL and key, both of which are needed for any table access
    pub fn store(&self) -> Result<(&str, &str), RemoteConfigError> {
        let url = self
            .store_url
            .as_deref()
            .ok_or(RemoteConfigError::Missing("SURVEYOR_STORE_URL"))?;
        let key = self
            .store_key
            .as_deref()
            .ok_or(RemoteConfigError::Missing("SURVEYOR_STORE_KEY"))?;
        Ok((url, key))
    }

    pub fn http_client(&self) -> Result<reqwest::Client, RemoteConfigError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "surveyor/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| RemoteConfigError::Client(e.to_string()))
    }
}

fn normalize_url(var: &'static str, raw: &str) -> Result<String, RemoteConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let has_host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    if !has_host {
        return Err(RemoteConfigError::InvalidUrl {
            var,
            value: raw.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
