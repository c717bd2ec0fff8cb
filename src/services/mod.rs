//! Service layer module
//!
//! Upstream client, response and stream translation, token accounting and
//! the relay pipeline

pub mod client;
pub mod relay;
pub mod response;
pub mod stream;
pub mod usage;

pub use client::UpstreamClient;
pub use relay::{RelayResponse, RelayService};
pub use stream::{FrameSink, StreamState, StreamSummary, StreamTranslator};
pub use usage::{BpeTokenCounter, EstimatingTokenCounter, TokenCounter};
