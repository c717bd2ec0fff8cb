//! Token accounting
//!
//! Token estimation for vendors that omit usage, and prompt counting for the
//! inbound dispatcher

use crate::models::openai::GeneralOpenAIRequest;
use crate::models::Usage;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::fmt::Display;
use tiktoken_rs::tokenizer::{get_tokenizer, Tokenizer};
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Per-message framing overhead added by chat templates
const TOKENS_PER_MESSAGE: u32 = 3;
/// Every reply is primed with an assistant header
const TOKENS_REPLY_PRIMING: u32 = 3;

/// Token counting collaborator
pub trait TokenCounter: Send + Sync {
    /// Count the tokens of a text for a model
    fn count_tokens(&self, text: &str, model: &str) -> u32;
}

static O200K_BASE: Lazy<Option<CoreBPE>> = Lazy::new(|| load_bpe("o200k_base", tiktoken_rs::o200k_base));
static CL100K_BASE: Lazy<Option<CoreBPE>> = Lazy::new(|| load_bpe("cl100k_base", tiktoken_rs::cl100k_base));
static P50K_BASE: Lazy<Option<CoreBPE>> = Lazy::new(|| load_bpe("p50k_base", tiktoken_rs::p50k_base));
static R50K_BASE: Lazy<Option<CoreBPE>> = Lazy::new(|| load_bpe("r50k_base", tiktoken_rs::r50k_base));

fn load_bpe<E: Display>(name: &str, load: impl FnOnce() -> Result<CoreBPE, E>) -> Option<CoreBPE> {
    match load() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            warn!("Failed to load {} encoding, falling back to estimation: {}", name, e);
            None
        }
    }
}

/// BPE counter choosing the encoding from the model name
///
/// Models without a known encoding are counted with `cl100k_base`. Texts
/// are estimated heuristically only when no encoding could be loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct BpeTokenCounter;

impl BpeTokenCounter {
    /// Encoding used for a model
    pub fn encoding_for(model: &str) -> Option<&'static CoreBPE> {
        let bpe = match get_tokenizer(model) {
            Some(Tokenizer::O200kBase) => &O200K_BASE,
            Some(Tokenizer::P50kBase) | Some(Tokenizer::P50kEdit) => &P50K_BASE,
            Some(Tokenizer::R50kBase) | Some(Tokenizer::Gpt2) => &R50K_BASE,
            _ => &CL100K_BASE,
        };
        bpe.as_ref().or(CL100K_BASE.as_ref())
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count_tokens(&self, text: &str, model: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        match Self::encoding_for(model) {
            Some(bpe) => u32::try_from(bpe.encode_ordinary(text).len()).unwrap_or(u32::MAX),
            None => EstimatingTokenCounter.count_tokens(text, model),
        }
    }
}

/// Heuristic counter: about four ASCII characters per token, one token per
/// CJK character
#[derive(Debug, Default, Clone, Copy)]
pub struct EstimatingTokenCounter;

impl TokenCounter for EstimatingTokenCounter {
    fn count_tokens(&self, text: &str, _model: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let mut wide = 0u32;
        let mut narrow = 0u32;
        for ch in text.chars() {
            if is_cjk(ch) {
                wide += 1;
            } else {
                narrow += 1;
            }
        }

        (wide + narrow.div_ceil(4)).max(1)
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3040..=0x30FF     // Hiragana, Katakana
        | 0x3400..=0x4DBF   // CJK Extension A
        | 0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0xF900..=0xFAFF   // CJK Compatibility Ideographs
        | 0x20000..=0x2FFFF)
}

/// Usage for a response whose text is known but whose usage is not
pub fn response_text_to_usage(counter: &dyn TokenCounter, text: &str, model: &str, prompt_tokens: u32) -> Usage {
    Usage::new(prompt_tokens, counter.count_tokens(text, model))
}

/// Prompt tokens of a canonical request, as the dispatcher pre-computes them
pub fn count_request_tokens(counter: &dyn TokenCounter, request: &GeneralOpenAIRequest) -> u32 {
    let model = request.model.as_str();

    if !request.messages.is_empty() {
        let body: u32 = request
            .messages
            .iter()
            .map(|m| {
                TOKENS_PER_MESSAGE
                    + counter.count_tokens(&m.role, model)
                    + counter.count_tokens(&m.string_content(), model)
                    + m.name.as_deref().map_or(0, |n| counter.count_tokens(n, model))
            })
            .sum();
        return body + TOKENS_REPLY_PRIMING;
    }

    request
        .prompt
        .as_ref()
        .or(request.input.as_ref())
        .map_or(0, |v| count_value_tokens(counter, v, model))
}

fn count_value_tokens(counter: &dyn TokenCounter, value: &Value, model: &str) -> u32 {
    match value {
        Value::String(s) => counter.count_tokens(s, model),
        Value::Array(items) => items.iter().map(|v| count_value_tokens(counter, v, model)).sum(),
        _ => 0,
    }
}
