//! Adaptor module
//!
//! Defines the Adaptor trait every vendor implementation supplies, plus the
//! helpers shared between implementations

pub mod channels;
pub mod openai;
pub mod refact;
pub mod registry;
pub mod vendors;

use crate::models::openai::{GeneralOpenAIRequest, ImageRequest};
use crate::models::{Meta, RelayMode, Usage};
use crate::services::client::UpstreamClient;
use crate::services::stream::FrameSink;
use crate::services::usage::TokenCounter;
use crate::utils::error::helpers::invalid_request;
use crate::utils::error::{ErrorContext, ErrorWithStatusCode, RelayError, RelayResult};
use crate::utils::logging::RelayObserver;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Response;
use serde_json::Value;
use std::sync::Arc;

pub use openai::OpenAIAdaptor;
pub use refact::RefactAdaptor;
pub use registry::AdaptorRegistry;

/// Result type crossing the adaptor boundary
pub type AdaptorResult<T> = Result<T, ErrorWithStatusCode>;

/// Pure URL builder for one vendor family
pub type UrlResolver = fn(&Meta) -> RelayResult<String>;

/// Process-wide collaborators handed to every adaptor call
#[derive(Clone)]
pub struct RelayContext {
    pub client: UpstreamClient,
    pub token_counter: Arc<dyn TokenCounter>,
    pub observer: Arc<dyn RelayObserver>,
    /// Frames buffered between upstream reader and caller
    pub stream_buffer: usize,
}

/// How a vendor delivers a response the caller asked to stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStrategy {
    /// Vendor speaks canonical SSE
    Native,
    /// Vendor is called non-streaming; its JSON reply is reshaped into a
    /// single frame followed by `[DONE]`
    SyntheticFromJson,
}

/// Per-vendor transport policy fixed at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorPolicy {
    pub stream: StreamStrategy,
    pub user_agent: Option<&'static str>,
    pub accept: Option<&'static str>,
}

impl VendorPolicy {
    /// Plain OpenAI-wire vendor
    pub const STANDARD: VendorPolicy = VendorPolicy {
        stream: StreamStrategy::Native,
        user_agent: None,
        accept: None,
    };
}

/// Result of a synchronous decode
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub status: u16,
    /// Vendor body, forwarded to the caller unchanged
    pub body: Bytes,
    pub usage: Usage,
}

/// Adaptor trait for upstream vendors
///
/// One implementation per vendor family; the registry maps channel types
/// to implementations. Everything except the upstream call and the body
/// reads is pure.
#[async_trait]
pub trait Adaptor: Send + Sync {
    /// Final upstream URL for a request
    fn get_request_url(&self, meta: &Meta) -> AdaptorResult<String>;

    /// Vendor authentication and transport headers, layered over the common ones
    fn setup_request_header(&self, headers: &mut HeaderMap, meta: &Meta) -> AdaptorResult<()>;

    /// Canonical request to vendor wire body
    fn convert_request(&self, meta: &Meta, request: GeneralOpenAIRequest) -> AdaptorResult<Value>;

    /// Canonical image request to vendor wire body
    fn convert_image_request(&self, meta: &Meta, request: ImageRequest) -> AdaptorResult<Value>;

    /// Send the wire body and return the open response
    async fn do_request(&self, ctx: &RelayContext, meta: &Meta, body: Value) -> AdaptorResult<Response> {
        do_request_helper(self, ctx, meta, body).await
    }

    /// Decode a complete vendor body into canonical usage
    async fn decode_sync(&self, ctx: &RelayContext, meta: &Meta, response: Response) -> AdaptorResult<SyncOutcome>;

    /// Forward a vendor stream to the sink and return usage at stream end
    async fn decode_stream(
        &self,
        ctx: &RelayContext,
        meta: &Meta,
        response: Response,
        sink: FrameSink,
    ) -> AdaptorResult<Usage>;

    /// Streaming behaviour for a request
    fn stream_strategy(&self, _meta: &Meta) -> StreamStrategy {
        StreamStrategy::Native
    }

    /// Models served by this vendor
    fn get_model_list(&self) -> Vec<String>;

    /// Display name of this vendor
    fn get_channel_name(&self) -> &str;
}

/// Headers every upstream request carries
pub fn setup_common_request_header(headers: &mut HeaderMap, meta: &Meta) {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let accept = if meta.is_stream { "text/event-stream" } else { "application/json" };
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    if let Ok(id) = HeaderValue::from_str(&meta.request_id) {
        if !meta.request_id.is_empty() {
            headers.insert(HeaderName::from_static("x-request-id"), id);
        }
    }
}

/// Build a header value, reporting bad input as a configuration error
pub fn header_value(name: &str, value: &str) -> RelayResult<HeaderValue> {
    HeaderValue::from_str(value).config_context(&format!("invalid value for header {}", name))
}

/// Resolve, build headers, serialize and send
///
/// The URL is validated before anything touches the network.
pub async fn do_request_helper<A>(adaptor: &A, ctx: &RelayContext, meta: &Meta, body: Value) -> AdaptorResult<Response>
where
    A: Adaptor + ?Sized,
{
    let url = adaptor.get_request_url(meta)?;
    reqwest::Url::parse(&url).config_context(&format!("invalid upstream url '{}'", url))?;

    let mut headers = HeaderMap::new();
    setup_common_request_header(&mut headers, meta);
    adaptor.setup_request_header(&mut headers, meta)?;

    let body = serde_json::to_vec(&body)
        .map_err(|e| invalid_request(format!("request body not serializable: {}", e)))?;

    ctx.observer.on_request(&url, &headers, &body);
    let upstream_stream = meta.is_stream && adaptor.stream_strategy(meta) == StreamStrategy::Native;
    let response = ctx.client.post(&url, headers, body, upstream_stream).await?;
    ctx.observer.on_response(&url, response.status().as_u16());

    Ok(response)
}

/// Reject requests that cannot be relayed in their mode
pub fn validate_request(meta: &Meta, request: &GeneralOpenAIRequest) -> RelayResult<()> {
    if request.model.trim().is_empty() {
        return Err(invalid_request("model is required"));
    }
    match meta.mode {
        RelayMode::ChatCompletions if request.messages.is_empty() => {
            Err(invalid_request("messages must not be empty"))
        }
        RelayMode::Completions if request.prompt.is_none() => {
            Err(invalid_request("prompt is required"))
        }
        RelayMode::Embeddings if request.input.is_none() => {
            Err(invalid_request("input is required"))
        }
        _ => Ok(()),
    }
}

/// Reject image requests without a prompt
pub fn validate_image_request(request: &ImageRequest) -> RelayResult<()> {
    if request.prompt.trim().is_empty() {
        return Err(invalid_request("prompt is required"));
    }
    Ok(())
}

/// Read the whole body of a response already known to be 200
pub async fn read_body(response: Response) -> RelayResult<Bytes> {
    response.bytes().await.map_err(RelayError::Transport)
}
