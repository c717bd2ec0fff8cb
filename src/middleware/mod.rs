//! Middleware module
//!
//! Request id assignment and request logging

pub mod logging;

pub use logging::{request_logging_middleware, RequestId};
