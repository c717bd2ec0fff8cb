//! Configuration management module
//!
//! Environment settings (`.env` aware) plus the JSON channel file

pub mod file;
pub mod settings;

pub use file::{AppConfig, ChannelConfig, ServerConfig};
pub use settings::Settings;
