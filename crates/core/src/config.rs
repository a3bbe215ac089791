//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into [`crate::ResourceService`]
//! and [`crate::HttpFhirClient`]. Nothing in this crate reads environment variables while
//! handling a request.

use crate::{CoreError, CoreResult};
use std::time::Duration;

/// Page size used when a list request does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest page size accepted from configuration.
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    base_url: String,
    default_page_size: u32,
    request_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `base_url` is the FHIR server root (for example `https://fhir.example.org/fhir`); a
    /// trailing slash is dropped.
    pub fn new(
        base_url: impl Into<String>,
        default_page_size: u32,
        request_timeout: Duration,
    ) -> CoreResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CoreError::Config("base_url cannot be empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "base_url must be an http(s) URL, got '{base_url}'"
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&default_page_size) {
            return Err(CoreError::Config(format!(
                "default_page_size must be between 1 and {MAX_PAGE_SIZE}, got {default_page_size}"
            )));
        }
        if request_timeout.is_zero() {
            return Err(CoreError::Config("request_timeout cannot be zero".into()));
        }

        Ok(Self {
            base_url,
            default_page_size,
            request_timeout,
        })
    }

    /// Resolve configuration from `FHIR_BASE_URL`, `FHIR_PAGE_SIZE` and `FHIR_TIMEOUT_SECS`.
    ///
    /// Intended to be called once from a binary's `main`.
    pub fn from_env() -> CoreResult<Self> {
        let base_url = std::env::var("FHIR_BASE_URL")
            .map_err(|_| CoreError::Config("FHIR_BASE_URL is not set".into()))?;
        let page_size = page_size_from_env_value(std::env::var("FHIR_PAGE_SIZE").ok())?;
        let timeout = timeout_from_env_value(std::env::var("FHIR_TIMEOUT_SECS").ok())?;
        Self::new(base_url, page_size, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Parse the default page size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_PAGE_SIZE`].
pub fn page_size_from_env_value(value: Option<String>) -> CoreResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| {
            v.parse::<u32>()
                .map_err(|e| CoreError::Config(format!("invalid FHIR_PAGE_SIZE '{v}': {e}")))
        })
        .transpose()?;

    Ok(parsed.unwrap_or(DEFAULT_PAGE_SIZE))
}

/// Parse the request timeout (whole seconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_TIMEOUT_SECS`].
pub fn timeout_from_env_value(value: Option<String>) -> CoreResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| {
            v.parse::<u64>()
                .map_err(|e| CoreError::Config(format!("invalid FHIR_TIMEOUT_SECS '{v}': {e}")))
        })
        .transpose()?;

    Ok(Duration::from_secs(parsed.unwrap_or(DEFAULT_TIMEOUT_SECS)))
}
