//! Vendor URL resolvers
//!
//! Pure functions from `Meta` to the final upstream URL. No I/O happens here.

use crate::models::{ChannelType, Meta, RelayMode};
use crate::utils::error::helpers::config_error;
use crate::utils::error::{RelayError, RelayResult};

/// Inference gateway whose routes omit the `/v1` segment
pub const GITHUB_MODELS_PREFIX: &str = "https://models.github.ai/inference";
/// Edge proxy that re-roots OpenAI and Azure paths
pub const CLOUDFLARE_GATEWAY_PREFIX: &str = "https://gateway.ai.cloudflare.com";
/// Fixed chat endpoint of the code-assistant vendor
pub const REFACT_CHAT_URL: &str = "https://inference.smallcloud.ai/v1/chat/completions";

/// Concatenate a base URL and a canonical path, applying gateway rewrites
pub fn full_request_url(base_url: &str, request_url: &str, channel_type: ChannelType) -> String {
    let base = base_url.trim_end_matches('/');

    if channel_type == ChannelType::OpenAiCompatible {
        if base_url.starts_with(GITHUB_MODELS_PREFIX) {
            return format!("{}{}", base, strip_v1(request_url));
        }
        return format!("{}{}", base, request_url);
    }

    if base_url.starts_with(CLOUDFLARE_GATEWAY_PREFIX) {
        match channel_type {
            ChannelType::OpenAi => return format!("{}{}", base, strip_v1(request_url)),
            ChannelType::Azure => {
                let path = request_url.strip_prefix("/openai/deployments").unwrap_or(request_url);
                return format!("{}{}", base, path);
            }
            _ => {}
        }
    }

    format!("{}{}", base, request_url)
}

fn strip_v1(path: &str) -> &str {
    path.strip_prefix("/v1").unwrap_or(path)
}

fn require_base(meta: &Meta) -> RelayResult<&str> {
    let base = meta.base_url.trim();
    if base.is_empty() {
        return Err(config_error(format!("channel type {} has no base url", meta.channel_type)));
    }
    Ok(base.trim_end_matches('/'))
}

fn unsupported(meta: &Meta) -> RelayError {
    config_error(format!(
        "unsupported relay mode {:?} for channel type {}",
        meta.mode, meta.channel_type
    ))
}

/// Default resolver: base URL plus canonical path
pub fn openai_url(meta: &Meta) -> RelayResult<String> {
    require_base(meta)?;
    Ok(full_request_url(&meta.base_url, &meta.request_url_path, meta.channel_type))
}

/// Azure deployments addressed by model, pinned to an API version
pub fn azure_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    let api_version = meta.api_version()?;

    if meta.mode == RelayMode::ImagesGenerations {
        return Ok(format!(
            "{}/openai/deployments/{}/images/generations?api-version={}",
            base, meta.actual_model_name, api_version
        ));
    }

    let path = meta.request_url_path.split('?').next().unwrap_or_default();
    let request_url = format!("{}?api-version={}", path, api_version);
    let task = request_url.strip_prefix("/v1/").unwrap_or(&request_url);
    // Deployment names cannot contain dots
    let model = meta.actual_model_name.replace('.', "");
    let request_url = format!("/openai/deployments/{}/{}", model, task);

    Ok(full_request_url(base, &request_url, meta.channel_type))
}

pub fn minimax_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    match meta.mode {
        RelayMode::ChatCompletions => Ok(format!("{}/v1/text/chatcompletion_v2", base)),
        _ => Err(unsupported(meta)),
    }
}

pub fn doubao_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    match meta.mode {
        RelayMode::ChatCompletions if meta.actual_model_name.starts_with("bot") => {
            Ok(format!("{}/api/v3/bots/chat/completions", base))
        }
        RelayMode::ChatCompletions => Ok(format!("{}/api/v3/chat/completions", base)),
        RelayMode::Embeddings => Ok(format!("{}/api/v3/embeddings", base)),
        _ => Err(unsupported(meta)),
    }
}

pub fn novita_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    match meta.mode {
        RelayMode::ChatCompletions => Ok(format!("{}/chat/completions", base)),
        _ => Err(unsupported(meta)),
    }
}

pub fn baidu_v2_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    match meta.mode {
        RelayMode::ChatCompletions => Ok(format!("{}/v2/chat/completions", base)),
        _ => Err(unsupported(meta)),
    }
}

pub fn ali_bailian_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    match meta.mode {
        RelayMode::ChatCompletions => Ok(format!("{}/compatible-mode/v1/chat/completions", base)),
        RelayMode::Embeddings => Ok(format!("{}/compatible-mode/v1/embeddings", base)),
        _ => Err(unsupported(meta)),
    }
}

/// Gemini's OpenAI-compatible surface lives under the base URL without `/v1`
pub fn gemini_url(meta: &Meta) -> RelayResult<String> {
    let base = require_base(meta)?;
    Ok(format!("{}{}", base, strip_v1(&meta.request_url_path)))
}

/// Fixed endpoint unless a base URL is configured
pub fn refact_url(meta: &Meta) -> RelayResult<String> {
    if meta.mode != RelayMode::ChatCompletions {
        return Err(unsupported(meta));
    }
    match meta.base_url.trim() {
        "" => Ok(REFACT_CHAT_URL.to_string()),
        base => Ok(format!("{}/v1/chat/completions", base.trim_end_matches('/'))),
    }
}
