//! Relay service
//!
//! Drives one request through its adaptor: convert, send, then decode
//! synchronously or hand the body to a spawned stream translator.

use super::client::UpstreamClient;
use super::response::ensure_success;
use super::stream::FrameSink;
use super::usage::{BpeTokenCounter, TokenCounter};
use crate::adaptors::{refact, AdaptorRegistry, AdaptorResult, RelayContext, StreamStrategy, SyncOutcome};
use crate::config::Settings;
use crate::models::openai::{GeneralOpenAIRequest, ImageRequest};
use crate::models::{Meta, RelayMode, Usage};
use crate::utils::error::helpers::config_error;
use crate::utils::logging::observer_for;
use anyhow::Result;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

/// Outcome of a relayed text request
pub enum RelayResponse {
    /// Complete vendor body
    Json { status: u16, body: Bytes, usage: Usage },
    /// Canonical SSE frames, plus the task that produces them
    Stream {
        frames: mpsc::Receiver<Bytes>,
        completion: JoinHandle<AdaptorResult<Usage>>,
    },
}

/// Relay service
pub struct RelayService {
    registry: Arc<AdaptorRegistry>,
    ctx: RelayContext,
}

impl RelayService {
    pub fn new(registry: AdaptorRegistry, ctx: RelayContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
        }
    }

    /// Build the service with the default registry and collaborators
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = AdaptorRegistry::with_defaults(&settings.attribution)?;
        let token_counter: Arc<dyn TokenCounter> = Arc::new(BpeTokenCounter);
        let ctx = RelayContext {
            client: UpstreamClient::new(&settings.upstream)?,
            token_counter,
            observer: observer_for(settings.upstream.debug),
            stream_buffer: settings.upstream.stream_buffer,
        };
        Ok(Self::new(registry, ctx))
    }

    pub fn registry(&self) -> &AdaptorRegistry {
        &self.registry
    }

    pub fn context(&self) -> &RelayContext {
        &self.ctx
    }

    /// Relay a chat, completion or embedding request
    pub async fn relay_text(&self, meta: Meta, request: GeneralOpenAIRequest) -> AdaptorResult<RelayResponse> {
        let adaptor = self.registry.lookup(meta.channel_type)?;
        let body = adaptor.convert_request(&meta, request)?;
        let response = adaptor.do_request(&self.ctx, &meta, body).await?;

        if !meta.is_stream {
            let outcome = adaptor.decode_sync(&self.ctx, &meta, response).await?;
            log_usage(&meta, &outcome.usage);
            return Ok(RelayResponse::Json {
                status: outcome.status,
                body: outcome.body,
                usage: outcome.usage,
            });
        }

        if adaptor.stream_strategy(&meta) == StreamStrategy::SyntheticFromJson {
            // Decode failures still reach the caller as JSON
            let reply = refact::buffer_reply(&self.ctx, &meta, response).await?;
            let (sink, frames) = FrameSink::channel(self.ctx.stream_buffer);
            let completion = tokio::spawn(
                async move {
                    let result = reply.replay(&sink).await;
                    if let Ok(usage) = &result {
                        log_usage(&meta, usage);
                    }
                    result
                }
                .in_current_span(),
            );
            return Ok(RelayResponse::Stream { frames, completion });
        }

        // Status errors still reach the caller as JSON, before any frame is sent
        let response = ensure_success(response).await?;

        let (sink, frames) = FrameSink::channel(self.ctx.stream_buffer);
        let ctx = self.ctx.clone();
        let completion = tokio::spawn(
            async move {
                let result = adaptor.decode_stream(&ctx, &meta, response, sink).await;
                match &result {
                    Ok(usage) => log_usage(&meta, usage),
                    Err(e) => warn!(status = e.status_code, "Stream ended with error: {}", e.error.message),
                }
                result
            }
            .in_current_span(),
        );

        Ok(RelayResponse::Stream { frames, completion })
    }

    /// Relay an image generation request
    pub async fn relay_image(&self, meta: Meta, request: ImageRequest) -> AdaptorResult<SyncOutcome> {
        if meta.mode != RelayMode::ImagesGenerations {
            return Err(config_error(format!("image relay called in mode {:?}", meta.mode)).into());
        }

        let adaptor = self.registry.lookup(meta.channel_type)?;
        let body = adaptor.convert_image_request(&meta, request)?;
        let response = adaptor.do_request(&self.ctx, &meta, body).await?;
        let outcome = adaptor.decode_sync(&self.ctx, &meta, response).await?;

        log_usage(&meta, &outcome.usage);
        Ok(outcome)
    }
}

fn log_usage(meta: &Meta, usage: &Usage) {
    info!(
        channel = %meta.channel_type,
        model = %meta.actual_model_name,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "Relay completed"
    );
}
