//! Data models module
//!
//! Canonical request/response shapes shared by every adaptor, plus the
//! per-request routing context (`Meta`)

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod meta;
pub mod openai;

pub use meta::{ChannelType, Meta, MetaConfig, RelayMode};

/// Error payload carried inside `ErrorWithStatusCode`
///
/// Mirrors the `{"error": {...}}` object most vendors return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error message
    #[serde(default)]
    pub message: String,
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code (vendors send both strings and numbers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
}

impl ApiError {
    /// Create an error payload with a string code
    pub fn new(message: impl Into<String>, error_type: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: error_type.into(),
            code: Some(Value::String(code.into())),
        }
    }

    /// Whether the payload carries any information at all
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.error_type.is_empty()
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt token count
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion token count
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total token count
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Build a consistent usage record from its two parts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Fill in partially reported usage so that `total == prompt + completion`.
    ///
    /// A vendor that reports only a total gets its prompt side from the
    /// caller's pre-computed count and the remainder as completion.
    pub fn reconcile(&mut self, prompt_tokens: u32) {
        if self.total_tokens != 0 && self.prompt_tokens == 0 {
            self.prompt_tokens = prompt_tokens;
            self.completion_tokens = self.total_tokens.saturating_sub(prompt_tokens);
        }
        self.total_tokens = self.prompt_tokens.saturating_add(self.completion_tokens);
    }

    /// Whether the invariant `total == prompt + completion` holds
    pub fn is_consistent(&self) -> bool {
        self.prompt_tokens.checked_add(self.completion_tokens) == Some(self.total_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_total_only() {
        let mut usage = Usage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 100 };
        usage.reconcile(30);
        assert_eq!(usage, Usage { prompt_tokens: 30, completion_tokens: 70, total_tokens: 100 });
    }

    #[test]
    fn test_reconcile_fills_missing_total() {
        let mut usage = Usage { prompt_tokens: 5, completion_tokens: 7, total_tokens: 0 };
        usage.reconcile(30);
        assert_eq!(usage.total_tokens, 12);
        assert_eq!(usage.prompt_tokens, 5);
    }

    #[test]
    fn test_reconcile_total_below_prompt() {
        let mut usage = Usage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 10 };
        usage.reconcile(30);
        assert_eq!(usage.completion_tokens, 0);
        assert!(usage.is_consistent());
    }

    #[test]
    fn test_api_error_code_accepts_numbers() {
        let error: ApiError = serde_json::from_str(r#"{"message":"boom","type":"server_error","code":500}"#).unwrap();
        assert_eq!(error.code, Some(serde_json::json!(500)));
        assert!(!error.is_empty());
    }
}
