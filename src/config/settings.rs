//! Application configuration settings
//!
//! Process-level knobs read from the environment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Listen address overrides for the JSON file values
    pub server: ServerOverride,
    /// Upstream call configuration
    pub upstream: UpstreamConfig,
    /// Attribution headers for vendors that want them
    pub attribution: AttributionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Listen address overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerOverride {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Upstream call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Non-streaming request timeout in seconds
    pub timeout: u64,
    /// Streaming request timeout in seconds
    pub stream_timeout: u64,
    /// Frames buffered between the upstream reader and the caller
    pub stream_buffer: usize,
    /// Log upstream payloads through the relay observer
    pub debug: bool,
}

/// Attribution headers (`HTTP-Referer`, `X-Title`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionConfig {
    pub referer: String,
    pub title: String,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            referer: "https://relaygate.local".to_string(),
            title: "RelayGate".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerOverride::default(),
            upstream: UpstreamConfig {
                timeout: 60,
                stream_timeout: 600,
                stream_buffer: 64,
                debug: false,
            },
            attribution: AttributionConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Settings {
    /// Create a new settings instance from the process environment
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let defaults = AttributionConfig::default();

        let settings = Self {
            server: ServerOverride {
                host: lookup("SERVER_HOST"),
                port: lookup("SERVER_PORT")
                    .map(|p| p.parse().context("Invalid port number"))
                    .transpose()?,
            },
            upstream: UpstreamConfig {
                timeout: get("REQUEST_TIMEOUT", "60")
                    .parse()
                    .context("Invalid request timeout")?,
                stream_timeout: get("STREAM_TIMEOUT", "600")
                    .parse()
                    .context("Invalid stream timeout")?,
                stream_buffer: get("STREAM_BUFFER", "64")
                    .parse()
                    .context("Invalid stream buffer size")?,
                debug: parse_flag(&get("RELAY_DEBUG", "false")).context("Invalid RELAY_DEBUG flag")?,
            },
            attribution: AttributionConfig {
                referer: get("ATTRIBUTION_REFERER", &defaults.referer),
                title: get("ATTRIBUTION_TITLE", &defaults.title),
            },
            logging: LoggingConfig {
                level: get("RUST_LOG", "info"),
                format: get("LOG_FORMAT", "text"),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        if self.server.port == Some(0) {
            anyhow::bail!("Port number cannot be 0");
        }

        if self.upstream.timeout == 0 || self.upstream.stream_timeout == 0 {
            anyhow::bail!("Timeout values cannot be 0");
        }

        if self.upstream.stream_buffer == 0 {
            anyhow::bail!("Stream buffer size cannot be 0");
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}
