//! Configuration for tabula
//!
//! Centralized configuration with sensible defaults. All state lives in
//! the remote registry; nothing here is persisted locally.

use std::time::Duration;

/// Default registry portal.
pub const DEFAULT_ENDPOINT: &str = "https://siasky.net/";

/// Environment variable overriding the registry portal.
pub const ENDPOINT_ENV_VAR: &str = "REGISTRY_URL";

/// Path of the registry API under the portal base URL.
const REGISTRY_PATH: &str = "skynet/registry";

/// Configuration for talking to the Registry Service
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Portal base URL, e.g. `https://siasky.net/`
    pub endpoint: String,

    // -------------------------------------------------------------------------
    // Timeout Configuration
    // -------------------------------------------------------------------------
    /// Timeout for ordinary entry reads
    pub read_timeout: Duration,

    /// Timeout for index-entry probes. A probe that times out is taken to
    /// mean "table never created", so this is deliberately shorter than
    /// `read_timeout`.
    pub index_timeout: Duration,

    // -------------------------------------------------------------------------
    // Retry Configuration
    // -------------------------------------------------------------------------
    /// Fixed delay between retries of a timed-out index read
    pub retry_delay: Duration,

    /// Max retry attempts before the timeout is surfaced to the caller
    pub retry_attempts: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            read_timeout: Duration::from_secs(30),
            index_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(3),
            retry_attempts: 3,
        }
    }
}

impl RegistryConfig {
    /// Create a new config builder
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }

    /// Default config, with the endpoint taken from the `REGISTRY_URL`
    /// environment variable when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENDPOINT_ENV_VAR) {
            if !url.is_empty() {
                config.endpoint = url;
            }
        }
        config
    }

    /// Full URL of the registry API under the configured portal
    pub fn registry_url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), REGISTRY_PATH)
    }
}

/// Builder for RegistryConfig
#[derive(Default)]
pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    /// Set the portal base URL
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    /// Set the timeout for ordinary entry reads
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the timeout for index-entry probes
    pub fn index_timeout(mut self, timeout: Duration) -> Self {
        self.config.index_timeout = timeout;
        self
    }

    /// Set the fixed delay between retries
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Set the max retry attempts for timed-out index reads
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn build(self) -> RegistryConfig {
        self.config
    }
}
