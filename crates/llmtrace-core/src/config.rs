//! Configuration for the LLMTrace SDK and server

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable consulted when no API key is passed to `init`
pub const API_KEY_ENV: &str = "LLMTRACE_API_KEY";

/// Environment variable consulted when no endpoint is passed to `init`
pub const ENDPOINT_ENV: &str = "LLMTRACE_ENDPOINT";

const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Options accepted by [`crate::init`]. Unset fields fall back to
/// environment variables and then to defaults.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// API key; falls back to `LLMTRACE_API_KEY`
    pub api_key: Option<String>,
    /// Server endpoint; falls back to `LLMTRACE_ENDPOINT`
    pub endpoint: Option<String>,
    /// Whether tracing is enabled at all
    pub enabled: bool,
    /// Enable debug logging in the SDK
    pub debug: bool,
    /// Worker wait timeout between queue polls, in seconds
    pub flush_interval: f64,
    /// Sampling rate in [0.0, 1.0]; 1.0 traces everything
    pub sample_rate: f64,
    /// Tags added to every trace
    pub default_tags: Vec<String>,
    /// Metadata added to every trace
    pub default_metadata: HashMap<String, serde_json::Value>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            enabled: true,
            debug: false,
            flush_interval: 5.0,
            sample_rate: 1.0,
            default_tags: Vec::new(),
            default_metadata: HashMap::new(),
        }
    }
}

impl InitOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the server endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Enable or disable tracing
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable debug logging
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the worker wait timeout in seconds
    pub fn flush_interval(mut self, seconds: f64) -> Self {
        self.flush_interval = seconds;
        self
    }

    /// Set the sampling rate
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set default tags added to every trace
    pub fn default_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.default_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set default metadata added to every trace
    pub fn default_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.default_metadata = metadata;
        self
    }
}

/// Resolved SDK configuration, built once at initialization
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// API key sent as `X-API-Key` on every delivery request
    pub api_key: String,
    /// Server endpoint, no trailing slash
    pub endpoint: String,
    /// Whether tracing is enabled
    pub enabled: bool,
    /// Debug logging
    pub debug: bool,
    /// Worker wait timeout between queue polls
    pub flush_interval: Duration,
    /// Sampling rate clamped to [0.0, 1.0]
    pub sample_rate: f64,
    /// Tags added to every trace
    pub default_tags: Vec<String>,
    /// Metadata added to every trace
    pub default_metadata: HashMap<String, serde_json::Value>,
}

impl SdkConfig {
    /// Resolve options against the environment. Returns `None` when no
    /// API key can be found; tracing then stays disabled.
    pub fn resolve(options: InitOptions) -> Option<Self> {
        let api_key = options
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.is_empty());

        let Some(api_key) = api_key else {
            if options.enabled {
                warn!(
                    "No API key provided. Set the api_key option or the {} \
                     environment variable. Tracing disabled.",
                    API_KEY_ENV
                );
            }
            return None;
        };

        let endpoint = options
            .endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let sample_rate = options.sample_rate.clamp(0.0, 1.0);
        if sample_rate != options.sample_rate {
            warn!(
                requested = options.sample_rate,
                clamped = sample_rate,
                "sample_rate outside [0.0, 1.0], clamped"
            );
        }

        Some(Self {
            api_key,
            endpoint,
            enabled: options.enabled,
            debug: options.debug,
            flush_interval: Duration::from_secs_f64(options.flush_interval.max(0.01)),
            sample_rate,
            default_tags: options.default_tags,
            default_metadata: options.default_metadata,
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
    /// API keys accepted by the ingestion endpoints
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_keys: Vec::new(),
        }
    }
}
