//! Static channel metadata
//!
//! Display name and model list per channel type, used for capability
//! discovery. Built once and never mutated.

use crate::models::ChannelType;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Name and models of one channel type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMeta {
    pub name: &'static str,
    pub models: &'static [&'static str],
}

static CHANNEL_META: Lazy<HashMap<ChannelType, ChannelMeta>> = Lazy::new(|| {
    let table: [(ChannelType, &'static str, &'static [&'static str]); 18] = [
        (
            ChannelType::OpenAi,
            "OpenAI",
            &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini", "o3-mini", "text-embedding-3-small", "dall-e-3"],
        ),
        (
            ChannelType::Azure,
            "Azure OpenAI",
            &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-35-turbo", "dall-e-3"],
        ),
        (ChannelType::OpenAiCompatible, "OpenAI Compatible", &["gpt-4o", "gpt-4o-mini"]),
        (
            ChannelType::OpenRouter,
            "OpenRouter",
            &["openai/gpt-4o", "anthropic/claude-3.5-sonnet", "google/gemini-2.0-flash-001"],
        ),
        (ChannelType::Minimax, "Minimax", &["abab6.5s-chat", "MiniMax-Text-01"]),
        (
            ChannelType::Doubao,
            "Doubao",
            &["doubao-pro-32k", "doubao-lite-32k", "doubao-embedding"],
        ),
        (
            ChannelType::Novita,
            "Novita",
            &["meta-llama/llama-3.1-8b-instruct", "meta-llama/llama-3.1-70b-instruct"],
        ),
        (ChannelType::BaiduV2, "Baidu V2", &["ernie-4.0-8k", "ernie-3.5-8k", "ernie-speed-128k"]),
        (
            ChannelType::AliBailian,
            "Ali Bailian",
            &["qwen-turbo", "qwen-plus", "qwen-max", "text-embedding-v3"],
        ),
        (
            ChannelType::GeminiOpenAiCompatible,
            "Gemini OpenAI Compatible",
            &["gemini-2.0-flash", "gemini-1.5-pro"],
        ),
        (ChannelType::Refact, "Refact.ai", &["gpt-4.1", "code-complete-alpha"]),
        (ChannelType::DeepSeek, "DeepSeek", &["deepseek-chat", "deepseek-reasoner"]),
        (
            ChannelType::Groq,
            "Groq",
            &["llama-3.3-70b-versatile", "llama-3.1-8b-instant", "mixtral-8x7b-32768"],
        ),
        (
            ChannelType::Mistral,
            "Mistral",
            &["mistral-large-latest", "mistral-small-latest", "codestral-latest"],
        ),
        (ChannelType::Moonshot, "Moonshot", &["moonshot-v1-8k", "moonshot-v1-32k", "moonshot-v1-128k"]),
        (
            ChannelType::TogetherAi,
            "Together AI",
            &["meta-llama/Llama-3.3-70B-Instruct-Turbo", "Qwen/Qwen2.5-72B-Instruct-Turbo"],
        ),
        (ChannelType::XAi, "xAI", &["grok-2", "grok-beta"]),
        (
            ChannelType::SiliconFlow,
            "SiliconFlow",
            &["deepseek-ai/DeepSeek-V3", "Qwen/Qwen2.5-7B-Instruct"],
        ),
    ];

    table
        .into_iter()
        .map(|(channel_type, name, models)| (channel_type, ChannelMeta { name, models }))
        .collect()
});

/// Metadata of a channel type
pub fn channel_meta(channel_type: ChannelType) -> Option<&'static ChannelMeta> {
    CHANNEL_META.get(&channel_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_channel_type_has_metadata() {
        for channel_type in ChannelType::ALL {
            let meta = channel_meta(channel_type).unwrap();
            assert!(!meta.name.is_empty());
            assert!(!meta.models.is_empty());
        }
    }

    #[test]
    fn test_refact_metadata() {
        let meta = channel_meta(ChannelType::Refact).unwrap();
        assert_eq!(meta.name, "Refact.ai");
        assert_eq!(meta.models, &["gpt-4.1", "code-complete-alpha"]);
    }
}
