//! Response translator (synchronous path)
//!
//! Status checking, canonical body decoding and usage reconciliation shared
//! by every adaptor

use super::usage::{response_text_to_usage, TokenCounter};
use crate::models::openai::{ErrorEnvelope, ImageResponse, TextResponse};
use crate::models::{ApiError, Meta, Usage};
use crate::utils::error::{helpers, ErrorContext, RelayError, RelayResult};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// Pass a 200 response through; turn anything else into an upstream error
///
/// The error status mirrors the upstream one. A body that is not a vendor
/// error envelope yields a synthesized message.
pub async fn ensure_success(response: Response) -> RelayResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(upstream_error(status.as_u16(), &body))
}

/// Build the upstream error for a failed status and its raw body
pub fn upstream_error(status: u16, body: &str) -> RelayError {
    let error = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or_default();

    let error = if error.is_empty() {
        debug!("Upstream error body not decodable ({} bytes)", body.len());
        ApiError {
            message: format!("bad response status code {}", status),
            error_type: "upstream_error".to_string(),
            code: Some(Value::from(status)),
        }
    } else {
        error
    };

    helpers::upstream_error(status, error)
}

/// Decode a chat/completion body and produce reconciled usage
///
/// Vendor usage is trusted when present; otherwise completion tokens are
/// estimated from the returned text.
pub fn decode_text(body: &[u8], meta: &Meta, counter: &dyn TokenCounter) -> RelayResult<Usage> {
    let response: TextResponse = serde_json::from_slice(body).decode_context("text response")?;

    if let Some(error) = response.error.as_ref().filter(|e| !e.is_null()) {
        return Err(helpers::upstream_error(500, embedded_error(error)));
    }

    let usage = match response.usage.filter(|u| *u != Usage::default()) {
        Some(usage) => {
            check_prompt_tokens(&usage, meta);
            usage
        }
        None => {
            let text: String = response.choices.iter().map(|c| c.text()).collect();
            debug!("Vendor omitted usage, estimating from {} chars", text.len());
            response_text_to_usage(counter, &text, &meta.actual_model_name, meta.prompt_tokens)
        }
    };

    Ok(reconcile(usage, meta))
}

/// Decode an image generation body; at least one asset must be present
pub fn decode_image(body: &[u8], meta: &Meta) -> RelayResult<Usage> {
    let response: ImageResponse = serde_json::from_slice(body).decode_context("image response")?;

    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(helpers::upstream_error(500, error));
    }

    if !response.data.iter().any(|d| d.has_asset()) {
        return Err(RelayError::NoContent(format!(
            "image generation returned {} entries without url or b64_json",
            response.data.len()
        )));
    }

    Ok(Usage::new(meta.prompt_tokens, 0))
}

/// Usage at stream end: vendor totals if they were sent, else an estimate
pub fn stream_usage(reported: Option<Usage>, text: &str, meta: &Meta, counter: &dyn TokenCounter) -> Usage {
    let usage = match reported.filter(|u| u.total_tokens != 0) {
        Some(usage) => {
            check_prompt_tokens(&usage, meta);
            usage
        }
        None => response_text_to_usage(counter, text, &meta.actual_model_name, meta.prompt_tokens),
    };
    reconcile(usage, meta)
}

/// Apply the total-only rule and restore `total == prompt + completion`
pub fn reconcile(mut usage: Usage, meta: &Meta) -> Usage {
    usage.reconcile(meta.prompt_tokens);
    usage
}

fn check_prompt_tokens(usage: &Usage, meta: &Meta) {
    if usage.prompt_tokens != 0 && meta.prompt_tokens != 0 && usage.prompt_tokens != meta.prompt_tokens {
        warn!(
            channel = %meta.channel_type,
            model = %meta.actual_model_name,
            reported = usage.prompt_tokens,
            estimated = meta.prompt_tokens,
            "Prompt token mismatch between vendor report and caller estimate"
        );
    }
}

fn embedded_error(error: &Value) -> ApiError {
    match error {
        Value::String(message) => ApiError::new(message.clone(), "upstream_error", "embedded_error"),
        other => serde_json::from_value::<ApiError>(other.clone())
            .ok()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| ApiError::new(other.to_string(), "upstream_error", "embedded_error")),
    }
}
