//! OpenAI-wire adaptor
//!
//! Serves every vendor family that speaks the OpenAI chat/completion wire
//! format; vendors differ only in URL resolver, auth header and transport
//! policy.

use super::channels::channel_meta;
use super::refact::{self, REFACT_HOST, REFACT_POLICY};
use super::{
    header_value, read_body, validate_image_request, validate_request, Adaptor, AdaptorResult, RelayContext,
    StreamStrategy, SyncOutcome, UrlResolver, VendorPolicy,
};
use crate::config::settings::AttributionConfig;
use crate::models::openai::{GeneralOpenAIRequest, ImageRequest, StreamOptions};
use crate::models::{ChannelType, Meta, RelayMode, Usage};
use crate::services::response::{decode_image, decode_text, ensure_success, stream_usage};
use crate::services::stream::{FrameSink, StreamTranslator};
use crate::utils::error::helpers::invalid_request;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Response;
use serde_json::Value;
use tracing::debug;

/// OpenAI-wire adaptor
pub struct OpenAIAdaptor {
    channel_type: ChannelType,
    resolver: UrlResolver,
    policy: VendorPolicy,
    attribution: AttributionConfig,
    name: &'static str,
    models: Vec<String>,
}

impl OpenAIAdaptor {
    /// Create an adaptor for a channel type with its URL resolver
    pub fn new(channel_type: ChannelType, resolver: UrlResolver) -> Self {
        let (name, models) = match channel_meta(channel_type) {
            Some(meta) => (meta.name, meta.models.iter().map(|m| m.to_string()).collect()),
            None => (channel_type.as_str(), Vec::new()),
        };
        Self {
            channel_type,
            resolver,
            policy: VendorPolicy::STANDARD,
            attribution: AttributionConfig::default(),
            name,
            models,
        }
    }

    pub fn with_policy(mut self, policy: VendorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attribution(mut self, attribution: AttributionConfig) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Transport policy for a request
    ///
    /// A compatible channel pointed at the code-assistant host gets that
    /// vendor's policy; this is the only place the host is matched.
    pub fn policy_for(&self, meta: &Meta) -> &VendorPolicy {
        if meta.base_url.contains(REFACT_HOST) {
            &REFACT_POLICY
        } else {
            &self.policy
        }
    }
}

#[async_trait]
impl Adaptor for OpenAIAdaptor {
    fn get_request_url(&self, meta: &Meta) -> AdaptorResult<String> {
        Ok((self.resolver)(meta)?)
    }

    fn setup_request_header(&self, headers: &mut HeaderMap, meta: &Meta) -> AdaptorResult<()> {
        if meta.channel_type == ChannelType::Azure {
            headers.insert(HeaderName::from_static("api-key"), header_value("api-key", &meta.api_key)?);
            return Ok(());
        }

        headers.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("Bearer {}", meta.api_key))?,
        );

        let policy = self.policy_for(meta);
        if let Some(user_agent) = policy.user_agent {
            headers.insert(USER_AGENT, header_value("user-agent", user_agent)?);
        }
        if let Some(accept) = policy.accept {
            headers.insert(ACCEPT, header_value("accept", accept)?);
        }

        if meta.channel_type == ChannelType::OpenRouter {
            headers.insert(
                HeaderName::from_static("http-referer"),
                header_value("http-referer", &self.attribution.referer)?,
            );
            headers.insert(
                HeaderName::from_static("x-title"),
                header_value("x-title", &self.attribution.title)?,
            );
        }

        Ok(())
    }

    fn convert_request(&self, meta: &Meta, mut request: GeneralOpenAIRequest) -> AdaptorResult<Value> {
        validate_request(meta, &request)?;

        if self.stream_strategy(meta) == StreamStrategy::SyntheticFromJson {
            request.stream = false;
        }

        // Always ask for usage, even from vendors that may ignore it
        request
            .stream_options
            .get_or_insert_with(StreamOptions::default)
            .include_usage = true;

        serde_json::to_value(&request)
            .map_err(|e| invalid_request(format!("request not serializable: {}", e)).into())
    }

    fn convert_image_request(&self, _meta: &Meta, request: ImageRequest) -> AdaptorResult<Value> {
        validate_image_request(&request)?;
        serde_json::to_value(&request)
            .map_err(|e| invalid_request(format!("image request not serializable: {}", e)).into())
    }

    async fn decode_sync(&self, ctx: &RelayContext, meta: &Meta, response: Response) -> AdaptorResult<SyncOutcome> {
        let response = ensure_success(response).await?;
        let status = response.status().as_u16();
        let body = read_body(response).await?;

        let usage = match meta.mode {
            RelayMode::ImagesGenerations => decode_image(&body, meta)?,
            _ => decode_text(&body, meta, ctx.token_counter.as_ref())?,
        };

        debug!(
            prompt = usage.prompt_tokens,
            completion = usage.completion_tokens,
            "Decoded {} response",
            self.name
        );
        Ok(SyncOutcome { status, body, usage })
    }

    async fn decode_stream(
        &self,
        ctx: &RelayContext,
        meta: &Meta,
        response: Response,
        sink: FrameSink,
    ) -> AdaptorResult<Usage> {
        if self.stream_strategy(meta) == StreamStrategy::SyntheticFromJson {
            return refact::synthesize_stream(ctx, meta, response, sink).await;
        }

        let response = ensure_success(response).await?;
        let summary = StreamTranslator::new(sink, ctx.observer.clone())
            .run(Box::pin(response.bytes_stream()))
            .await?;

        Ok(stream_usage(
            summary.usage,
            &summary.response_text,
            meta,
            ctx.token_counter.as_ref(),
        ))
    }

    fn stream_strategy(&self, meta: &Meta) -> StreamStrategy {
        self.policy_for(meta).stream
    }

    fn get_model_list(&self) -> Vec<String> {
        self.models.clone()
    }

    fn get_channel_name(&self) -> &str {
        self.name
    }
}
