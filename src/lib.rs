//! RelayGate Library
//!
//! Translates one canonical OpenAI-style API into requests for many
//! upstream inference vendors, and their responses back.

pub mod adaptors;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export common types
pub use adaptors::{Adaptor, AdaptorRegistry, OpenAIAdaptor, RefactAdaptor, RelayContext};
pub use config::{AppConfig, Settings};
pub use handlers::{create_router, AppState};
pub use models::{openai, ChannelType, Meta, RelayMode, Usage};
pub use services::{RelayResponse, RelayService, UpstreamClient};
pub use utils::error::{ErrorWithStatusCode, RelayError, RelayResult};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
