//! File-based configuration loading
//!
//! Loads channel definitions from a JSON file

use crate::models::ChannelType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host (default: "127.0.0.1" - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 8082)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Application configuration loaded from JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (optional, defaults to localhost:8082)
    #[serde(default)]
    pub server: ServerConfig,

    /// Channel configurations, keyed by channel name
    pub channels: BTreeMap<String, ChannelConfig>,
}

/// One upstream channel: a vendor family plus its credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Vendor family
    #[serde(rename = "type")]
    pub channel_type: ChannelType,

    /// Base URL for the vendor API (may be empty for fixed-endpoint vendors)
    #[serde(rename = "baseUrl", default)]
    pub base_url: String,

    /// API key
    #[serde(rename = "apiKey", default)]
    pub api_key: String,

    /// Vendor API version (Azure)
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Models served by this channel
    #[serde(default)]
    pub models: Vec<String>,

    /// Caller model name -> vendor model name
    #[serde(rename = "modelMapping", default, skip_serializing_if = "HashMap::is_empty")]
    pub model_mapping: HashMap<String, String>,
}

impl ChannelConfig {
    /// Vendor model identifier for a caller-facing model name
    pub fn map_model(&self, model: &str) -> String {
        self.model_mapping
            .get(model)
            .cloned()
            .unwrap_or_else(|| model.to_string())
    }

    /// Whether the channel answers for a model name
    pub fn serves(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model) || self.model_mapping.contains_key(model)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)?;

        debug!("Loaded {} channels", config.channels.len());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. ~/.config/relaygate/relaygate.json
    /// 2. ./relaygate.json
    ///
    /// Returns error if no configuration file is found.
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("relaygate").join("relaygate.json");
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        let local_path = Path::new("relaygate.json");
        if local_path.exists() {
            return Self::load(local_path);
        }

        anyhow::bail!(
            "Configuration file not found. Please create one at:\n\
             - ~/.config/relaygate/relaygate.json (recommended)\n\
             - ./relaygate.json (current directory)"
        )
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            anyhow::bail!("At least one channel must be configured");
        }

        for (name, channel) in &self.channels {
            let fixed_endpoint = channel.channel_type == ChannelType::Refact;
            if channel.base_url.is_empty() && !fixed_endpoint {
                anyhow::bail!("Channel '{}' must have a base URL", name);
            }
            if !channel.base_url.is_empty() && !channel.base_url.starts_with("http") {
                anyhow::bail!("Invalid base URL for channel '{}': {}", name, channel.base_url);
            }

            if channel.channel_type == ChannelType::Azure
                && channel.api_version.as_deref().map_or(true, |v| v.trim().is_empty())
            {
                anyhow::bail!("Azure channel '{}' requires apiVersion", name);
            }

            if channel.models.is_empty() && channel.model_mapping.is_empty() {
                anyhow::bail!("Channel '{}' must have at least one model configured", name);
            }
        }

        Ok(())
    }

    /// First channel, by name, that serves a model
    ///
    /// Static stand-in for channel selection: no balancing, no failover.
    pub fn channel_for_model(&self, model: &str) -> Option<(&str, &ChannelConfig)> {
        self.channels
            .iter()
            .find(|(_, channel)| channel.serves(model))
            .map(|(name, channel)| (name.as_str(), channel))
    }

    /// All caller-facing model names, sorted and deduplicated
    pub fn list_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self
            .channels
            .values()
            .flat_map(|c| c.models.iter().chain(c.model_mapping.keys()).cloned())
            .collect();
        models.sort();
        models.dedup();
        models
    }
}
