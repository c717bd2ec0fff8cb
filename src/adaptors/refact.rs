//! Refact.ai adaptor
//!
//! The code-assistant vendor does not speak canonical SSE. It is always
//! called non-streaming with a reduced body; when the caller asked for a
//! stream, the JSON reply is replayed as one chunk followed by `[DONE]`.

use super::channels::channel_meta;
use super::{
    header_value, read_body, validate_request, vendors, Adaptor, AdaptorResult, RelayContext, StreamStrategy,
    SyncOutcome, VendorPolicy,
};
use crate::models::openai::{
    ChatCompletionsStreamResponse, GeneralOpenAIRequest, ImageRequest, Message, StreamChoice, StreamDelta,
    TextResponse,
};
use crate::models::{Meta, Usage};
use crate::services::response::{decode_text, ensure_success};
use crate::services::stream::{FrameSink, DONE};
use crate::utils::error::helpers::invalid_request;
use crate::utils::error::{ErrorContext, ErrorWithStatusCode, RelayError, RelayResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Response;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Host of the vendor's inference API
pub const REFACT_HOST: &str = "inference.smallcloud.ai";

/// Transport policy of the vendor
pub const REFACT_POLICY: VendorPolicy = VendorPolicy {
    stream: StreamStrategy::SyntheticFromJson,
    user_agent: Some("refact-lsp 0.10.19"),
    accept: Some("application/json"),
};

/// Reduced request body; extension fields are dropped
#[derive(Debug, Serialize)]
struct RefactRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Refact.ai adaptor
#[derive(Debug, Default)]
pub struct RefactAdaptor;

impl RefactAdaptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Adaptor for RefactAdaptor {
    fn get_request_url(&self, meta: &Meta) -> AdaptorResult<String> {
        Ok(vendors::refact_url(meta)?)
    }

    fn setup_request_header(&self, headers: &mut HeaderMap, meta: &Meta) -> AdaptorResult<()> {
        headers.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("Bearer {}", meta.api_key))?,
        );
        if let Some(user_agent) = REFACT_POLICY.user_agent {
            headers.insert(USER_AGENT, header_value("user-agent", user_agent)?);
        }
        if let Some(accept) = REFACT_POLICY.accept {
            headers.insert(ACCEPT, header_value("accept", accept)?);
        }
        Ok(())
    }

    fn convert_request(&self, meta: &Meta, request: GeneralOpenAIRequest) -> AdaptorResult<Value> {
        validate_request(meta, &request)?;

        let reduced = RefactRequest {
            model: request.model,
            messages: request.messages,
            stream: false,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        };

        serde_json::to_value(&reduced)
            .map_err(|e| invalid_request(format!("request not serializable: {}", e)).into())
    }

    fn convert_image_request(&self, _meta: &Meta, _request: ImageRequest) -> AdaptorResult<Value> {
        Err(invalid_request("refact does not support image generation").into())
    }

    async fn decode_sync(&self, ctx: &RelayContext, meta: &Meta, response: Response) -> AdaptorResult<SyncOutcome> {
        let response = ensure_success(response).await?;
        let status = response.status().as_u16();
        let raw = read_body(response).await?;
        let completion = decode_completion(&raw, meta, ctx)?;

        let body = json!({
            "id": completion_id(),
            "object": "chat.completion",
            "created": chrono::Utc::now().timestamp(),
            "model": meta.actual_model_name,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": completion.text},
                "finish_reason": "stop",
            }],
            "usage": completion.usage,
        });

        let body = serde_json::to_vec(&body).map_err(|e| RelayError::Decode(e.to_string()))?;
        Ok(SyncOutcome {
            status,
            body: Bytes::from(body),
            usage: completion.usage,
        })
    }

    async fn decode_stream(
        &self,
        ctx: &RelayContext,
        meta: &Meta,
        response: Response,
        sink: FrameSink,
    ) -> AdaptorResult<Usage> {
        synthesize_stream(ctx, meta, response, sink).await
    }

    fn stream_strategy(&self, _meta: &Meta) -> StreamStrategy {
        REFACT_POLICY.stream
    }

    fn get_model_list(&self) -> Vec<String> {
        channel_meta(crate::models::ChannelType::Refact)
            .map(|m| m.models.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }

    fn get_channel_name(&self) -> &str {
        "Refact.ai"
    }
}

struct Completion {
    text: String,
    usage: Usage,
}

fn decode_completion(body: &[u8], meta: &Meta, ctx: &RelayContext) -> RelayResult<Completion> {
    let usage = decode_text(body, meta, ctx.token_counter.as_ref())?;
    let response: TextResponse = serde_json::from_slice(body).decode_context("refact response")?;

    let text = response
        .choices
        .first()
        .map(|c| c.text())
        .ok_or_else(|| RelayError::Decode("response has no choices".to_string()))?;

    Ok(Completion { text, usage })
}

fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// A non-streaming reply, decoded and ready to replay as frames
#[derive(Debug, Clone)]
pub struct SyntheticReply {
    payload: String,
    usage: Usage,
}

impl SyntheticReply {
    /// Write the single chunk and the terminator
    pub async fn replay(self, sink: &FrameSink) -> AdaptorResult<Usage> {
        send_frames(sink, &[self.payload.as_str(), DONE]).await?;
        debug!("Replayed non-streaming reply as a synthetic stream");
        Ok(self.usage)
    }
}

/// Read and decode a complete reply before any frame is written
///
/// Status and decode failures surface here, while the caller can still be
/// answered with a JSON error.
pub async fn buffer_reply(ctx: &RelayContext, meta: &Meta, response: Response) -> AdaptorResult<SyntheticReply> {
    let response = ensure_success(response).await?;
    let raw = read_body(response).await?;
    let completion = decode_completion(&raw, meta, ctx)?;

    let chunk = ChatCompletionsStreamResponse {
        id: completion_id(),
        object: "chat.completion.chunk".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: meta.actual_model_name.clone(),
        choices: vec![StreamChoice {
            index: 0,
            delta: StreamDelta {
                role: Some("assistant".to_string()),
                content: Some(completion.text),
            },
            text: None,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(completion.usage),
    };

    let payload = serde_json::to_string(&chunk).map_err(|e| RelayError::Decode(e.to_string()))?;
    Ok(SyntheticReply {
        payload,
        usage: completion.usage,
    })
}

/// Replay a non-streaming JSON reply as a single canonical chunk
///
/// Used for vendors whose streaming protocol cannot be relayed frame by
/// frame. The caller sees one content chunk carrying usage, then `[DONE]`.
pub async fn synthesize_stream(
    ctx: &RelayContext,
    meta: &Meta,
    response: Response,
    sink: FrameSink,
) -> AdaptorResult<Usage> {
    buffer_reply(ctx, meta, response).await?.replay(&sink).await
}

async fn send_frames(sink: &FrameSink, payloads: &[&str]) -> Result<(), ErrorWithStatusCode> {
    for payload in payloads {
        sink.send_data(payload).await?;
    }
    Ok(())
}
