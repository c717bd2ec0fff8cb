//! Relay handlers
//!
//! Canonical OpenAI-wire endpoints. Each handler picks the channel for the
//! requested model, builds `Meta` and hands the request to the relay service.

use crate::config::ChannelConfig;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::models::openai::{GeneralOpenAIRequest, ImageRequest};
use crate::models::{ApiError, Meta};
use crate::services::usage::count_request_tokens;
use crate::services::RelayResponse;
use crate::utils::error::helpers::invalid_request;
use crate::utils::error::ErrorWithStatusCode;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<GeneralOpenAIRequest>, JsonRejection>,
) -> Response {
    relay_text(state, "/v1/chat/completions", request_id, payload).await
}

/// POST /v1/completions
pub async fn completions(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<GeneralOpenAIRequest>, JsonRejection>,
) -> Response {
    relay_text(state, "/v1/completions", request_id, payload).await
}

/// POST /v1/embeddings
pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<GeneralOpenAIRequest>, JsonRejection>,
) -> Response {
    relay_text(state, "/v1/embeddings", request_id, payload).await
}

/// POST /v1/images/generations
pub async fn image_generations(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let Json(mut request) = payload.map_err(rejection_error)?;
        let meta = build_meta(&state, "/v1/images/generations", &request.model, false, request_id)?;
        request.model = meta.actual_model_name.clone();

        state.relay.relay_image(meta, request).await
    }
    .await;

    match result {
        Ok(outcome) => json_response(outcome.status, outcome.body),
        Err(err) => err.into_response(),
    }
}

/// GET /v1/models
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut data = Vec::new();
    for model in state.config.list_models() {
        let owned_by = state
            .config
            .channel_for_model(&model)
            .and_then(|(_, channel)| state.relay.registry().lookup(channel.channel_type).ok())
            .map(|adaptor| adaptor.get_channel_name().to_string())
            .unwrap_or_default();
        data.push(json!({"id": model, "object": "model", "owned_by": owned_by}));
    }
    Json(json!({"object": "list", "data": data}))
}

/// GET /v1/channels
///
/// Static capability metadata of every registered vendor
pub async fn list_channels(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.relay.registry();
    let data: Vec<_> = registry
        .channel_types()
        .into_iter()
        .filter_map(|channel_type| {
            registry.lookup(channel_type).ok().map(|adaptor| {
                json!({
                    "type": channel_type,
                    "name": adaptor.get_channel_name(),
                    "models": adaptor.get_model_list(),
                })
            })
        })
        .collect();
    Json(json!({"object": "list", "data": data}))
}

async fn relay_text(
    state: Arc<AppState>,
    path: &str,
    request_id: Option<Extension<RequestId>>,
    payload: Result<Json<GeneralOpenAIRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let Json(mut request) = payload.map_err(rejection_error)?;
        let prompt_tokens = count_request_tokens(state.relay.context().token_counter.as_ref(), &request);
        let meta = build_meta(&state, path, &request.model, request.stream, request_id)?
            .with_prompt_tokens(prompt_tokens);
        request.model = meta.actual_model_name.clone();

        debug!(
            channel = %meta.channel_type,
            model = %meta.actual_model_name,
            stream = meta.is_stream,
            prompt_tokens,
            "Relaying request"
        );
        state.relay.relay_text(meta, request).await
    }
    .await;

    match result {
        Ok(RelayResponse::Json { status, body, .. }) => json_response(status, body),
        Ok(RelayResponse::Stream { frames, .. }) => sse_response(frames),
        Err(err) => err.into_response(),
    }
}

/// Resolve the channel for a model and build the request context
fn build_meta(
    state: &AppState,
    path: &str,
    model: &str,
    stream: bool,
    request_id: Option<Extension<RequestId>>,
) -> Result<Meta, ErrorWithStatusCode> {
    if model.trim().is_empty() {
        return Err(invalid_request("model is required").into());
    }

    let (name, channel) = state.config.channel_for_model(model).ok_or_else(|| {
        ErrorWithStatusCode::new(
            StatusCode::NOT_FOUND.as_u16(),
            ApiError::new(
                format!("model '{}' is not served by any channel", model),
                "invalid_request_error",
                "model_not_found",
            ),
        )
    })?;
    debug!("Model {} routed to channel {}", model, name);

    Ok(meta_for_channel(channel, path, model, stream, request_id))
}

fn meta_for_channel(
    channel: &ChannelConfig,
    path: &str,
    model: &str,
    stream: bool,
    request_id: Option<Extension<RequestId>>,
) -> Meta {
    let mut meta = Meta::new(channel.channel_type, &channel.base_url, &channel.api_key, path)
        .with_model(model, channel.map_model(model))
        .with_stream(stream);
    if let Some(Extension(RequestId(id))) = request_id {
        meta = meta.with_request_id(id);
    }
    if let Some(api_version) = &channel.api_version {
        meta = meta.with_api_version(api_version);
    }
    meta
}

fn rejection_error(rejection: JsonRejection) -> ErrorWithStatusCode {
    invalid_request(rejection.body_text()).into()
}

fn json_response(status: u16, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Raw `text/event-stream` body fed by the stream translator
fn sse_response(frames: tokio::sync::mpsc::Receiver<Bytes>) -> Response {
    let stream = ReceiverStream::new(frames).map(Ok::<_, Infallible>);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
