//! Adaptor registry
//!
//! Maps a channel type to the adaptor that implements it

use super::{vendors, Adaptor, OpenAIAdaptor, RefactAdaptor, UrlResolver};
use crate::config::settings::AttributionConfig;
use crate::models::ChannelType;
use crate::utils::error::helpers::config_error;
use crate::utils::error::RelayResult;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Adaptor registry
///
/// Built once at startup and read-only afterwards.
pub struct AdaptorRegistry {
    adaptors: HashMap<ChannelType, Arc<dyn Adaptor>>,
}

impl AdaptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adaptors: HashMap::new(),
        }
    }

    /// Registry with every built-in vendor
    pub fn with_defaults(attribution: &AttributionConfig) -> Result<Self> {
        let openai_wire: [(ChannelType, UrlResolver); 17] = [
            (ChannelType::OpenAi, vendors::openai_url),
            (ChannelType::Azure, vendors::azure_url),
            (ChannelType::OpenAiCompatible, vendors::openai_url),
            (ChannelType::OpenRouter, vendors::openai_url),
            (ChannelType::Minimax, vendors::minimax_url),
            (ChannelType::Doubao, vendors::doubao_url),
            (ChannelType::Novita, vendors::novita_url),
            (ChannelType::BaiduV2, vendors::baidu_v2_url),
            (ChannelType::AliBailian, vendors::ali_bailian_url),
            (ChannelType::GeminiOpenAiCompatible, vendors::gemini_url),
            (ChannelType::DeepSeek, vendors::openai_url),
            (ChannelType::Groq, vendors::openai_url),
            (ChannelType::Mistral, vendors::openai_url),
            (ChannelType::Moonshot, vendors::openai_url),
            (ChannelType::TogetherAi, vendors::openai_url),
            (ChannelType::XAi, vendors::openai_url),
            (ChannelType::SiliconFlow, vendors::openai_url),
        ];

        let mut registry = Self::new();
        for (channel_type, resolver) in openai_wire {
            let adaptor = OpenAIAdaptor::new(channel_type, resolver).with_attribution(attribution.clone());
            registry.register(channel_type, Arc::new(adaptor))?;
        }
        registry.register(ChannelType::Refact, Arc::new(RefactAdaptor::new()))?;

        info!("Adaptor registry initialized with {} channel types", registry.len());
        Ok(registry)
    }

    /// Register an adaptor
    ///
    /// Fails on duplicates and on adaptors without capability metadata.
    pub fn register(&mut self, channel_type: ChannelType, adaptor: Arc<dyn Adaptor>) -> Result<()> {
        if self.adaptors.contains_key(&channel_type) {
            anyhow::bail!("Adaptor already registered for channel type {}", channel_type);
        }
        if adaptor.get_channel_name().trim().is_empty() {
            anyhow::bail!("Adaptor for channel type {} has no channel name", channel_type);
        }
        if adaptor.get_model_list().is_empty() {
            anyhow::bail!("Adaptor for channel type {} has no models", channel_type);
        }

        debug!("Registered adaptor {} for {}", adaptor.get_channel_name(), channel_type);
        self.adaptors.insert(channel_type, adaptor);
        Ok(())
    }

    /// Adaptor for a channel type
    pub fn lookup(&self, channel_type: ChannelType) -> RelayResult<Arc<dyn Adaptor>> {
        self.adaptors
            .get(&channel_type)
            .cloned()
            .ok_or_else(|| config_error(format!("no adaptor registered for channel type {}", channel_type)))
    }

    /// Registered channel types, in declaration order
    pub fn channel_types(&self) -> Vec<ChannelType> {
        ChannelType::ALL
            .into_iter()
            .filter(|t| self.adaptors.contains_key(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adaptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adaptors.is_empty()
    }
}

impl Default for AdaptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
