//! Per-request routing context
//!
//! `Meta` tells an adaptor which vendor, credential and mode apply to one
//! request. It is built by the inbound dispatcher and only read by adaptors.

use crate::utils::error::helpers::config_error;
use crate::utils::error::RelayResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor family of a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    #[serde(rename = "open_router")]
    OpenRouter,
    #[serde(rename = "minimax")]
    Minimax,
    #[serde(rename = "doubao")]
    Doubao,
    #[serde(rename = "novita")]
    Novita,
    #[serde(rename = "baidu_v2")]
    BaiduV2,
    #[serde(rename = "ali_bailian")]
    AliBailian,
    #[serde(rename = "gemini_openai_compatible")]
    GeminiOpenAiCompatible,
    #[serde(rename = "refact")]
    Refact,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "together_ai")]
    TogetherAi,
    #[serde(rename = "xai")]
    XAi,
    #[serde(rename = "siliconflow")]
    SiliconFlow,
}

impl ChannelType {
    /// Every known channel type
    pub const ALL: [ChannelType; 18] = [
        ChannelType::OpenAi,
        ChannelType::Azure,
        ChannelType::OpenAiCompatible,
        ChannelType::OpenRouter,
        ChannelType::Minimax,
        ChannelType::Doubao,
        ChannelType::Novita,
        ChannelType::BaiduV2,
        ChannelType::AliBailian,
        ChannelType::GeminiOpenAiCompatible,
        ChannelType::Refact,
        ChannelType::DeepSeek,
        ChannelType::Groq,
        ChannelType::Mistral,
        ChannelType::Moonshot,
        ChannelType::TogetherAi,
        ChannelType::XAi,
        ChannelType::SiliconFlow,
    ];

    /// Configuration key of the channel type
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::OpenAi => "openai",
            ChannelType::Azure => "azure",
            ChannelType::OpenAiCompatible => "openai_compatible",
            ChannelType::OpenRouter => "open_router",
            ChannelType::Minimax => "minimax",
            ChannelType::Doubao => "doubao",
            ChannelType::Novita => "novita",
            ChannelType::BaiduV2 => "baidu_v2",
            ChannelType::AliBailian => "ali_bailian",
            ChannelType::GeminiOpenAiCompatible => "gemini_openai_compatible",
            ChannelType::Refact => "refact",
            ChannelType::DeepSeek => "deepseek",
            ChannelType::Groq => "groq",
            ChannelType::Mistral => "mistral",
            ChannelType::Moonshot => "moonshot",
            ChannelType::TogetherAi => "together_ai",
            ChannelType::XAi => "xai",
            ChannelType::SiliconFlow => "siliconflow",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relay mode, derived from the canonical request path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RelayMode {
    #[default]
    ChatCompletions,
    Completions,
    Embeddings,
    ImagesGenerations,
    Unknown,
}

impl RelayMode {
    /// Map a canonical path (query string ignored) to its relay mode
    pub fn from_path(path: &str) -> Self {
        let path = path.split('?').next().unwrap_or_default();
        if path.starts_with("/v1/chat/completions") {
            RelayMode::ChatCompletions
        } else if path.starts_with("/v1/completions") {
            RelayMode::Completions
        } else if path.starts_with("/v1/embeddings") || path.ends_with("embeddings") {
            RelayMode::Embeddings
        } else if path.starts_with("/v1/images/generations") {
            RelayMode::ImagesGenerations
        } else {
            RelayMode::Unknown
        }
    }
}

/// Channel-level settings carried into the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaConfig {
    /// Vendor API version (date/version-pinned vendors such as Azure)
    pub api_version: Option<String>,
}

/// Routing and authentication context for one request
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub channel_type: ChannelType,
    pub base_url: String,
    pub api_key: String,
    pub mode: RelayMode,
    pub is_stream: bool,
    /// Model name the caller asked for
    pub origin_model_name: String,
    /// Vendor-mapped model identifier
    pub actual_model_name: String,
    /// Prompt token count pre-computed by the caller
    pub prompt_tokens: u32,
    /// Original canonical path, e.g. `/v1/chat/completions`
    pub request_url_path: String,
    pub config: MetaConfig,
    /// Propagated upstream as `X-Request-Id`
    pub request_id: String,
}

impl Meta {
    /// Start a context for a channel; the mode follows the request path
    pub fn new(
        channel_type: ChannelType,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_url_path: impl Into<String>,
    ) -> Self {
        let request_url_path = request_url_path.into();
        Self {
            channel_type,
            base_url: base_url.into(),
            api_key: api_key.into(),
            mode: RelayMode::from_path(&request_url_path),
            request_url_path,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, origin: impl Into<String>, actual: impl Into<String>) -> Self {
        self.origin_model_name = origin.into();
        self.actual_model_name = actual.into();
        self
    }

    pub fn with_stream(mut self, is_stream: bool) -> Self {
        self.is_stream = is_stream;
        self
    }

    pub fn with_prompt_tokens(mut self, prompt_tokens: u32) -> Self {
        self.prompt_tokens = prompt_tokens;
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.config.api_version = Some(api_version.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// API version, required by version-pinned vendors
    pub fn api_version(&self) -> RelayResult<&str> {
        self.config
            .api_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                config_error(format!("channel type {} requires an api version", self.channel_type))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_mode_from_path() {
        assert_eq!(RelayMode::from_path("/v1/chat/completions"), RelayMode::ChatCompletions);
        assert_eq!(RelayMode::from_path("/v1/chat/completions?foo=bar"), RelayMode::ChatCompletions);
        assert_eq!(RelayMode::from_path("/v1/completions"), RelayMode::Completions);
        assert_eq!(RelayMode::from_path("/v1/embeddings"), RelayMode::Embeddings);
        assert_eq!(RelayMode::from_path("/v1/engines/ada/embeddings"), RelayMode::Embeddings);
        assert_eq!(RelayMode::from_path("/v1/images/generations"), RelayMode::ImagesGenerations);
        assert_eq!(RelayMode::from_path("/v1/audio/speech"), RelayMode::Unknown);
    }

    #[test]
    fn test_channel_type_serde_names() {
        for channel_type in ChannelType::ALL {
            let json = serde_json::to_string(&channel_type).unwrap();
            assert_eq!(json, format!("\"{}\"", channel_type.as_str()));
            let back: ChannelType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, channel_type);
        }
    }

    #[test]
    fn test_api_version_required() {
        let meta = Meta::new(ChannelType::Azure, "https://x.openai.azure.com", "k", "/v1/chat/completions");
        assert!(meta.api_version().is_err());

        let meta = meta.with_api_version("2024-03-01-preview");
        assert_eq!(meta.api_version().unwrap(), "2024-03-01-preview");
    }
}
