//! Utilities module
//!
//! Contains error handling and the injectable relay observability hook

pub mod error;
pub mod logging;
