//! Health check handlers
//!
//! Provides application health status check endpoints

use crate::handlers::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Version information
    pub version: String,
    /// Timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

/// Check result
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Configured channels
    pub channels: usize,
    /// Models served across all channels
    pub models: usize,
    /// Registered vendor adaptors
    pub adaptors: usize,
    pub uptime_seconds: u64,
}

/// Health check
///
/// GET /health
/// Reports 503 when no channel serves any model
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    debug!("Executing health check");

    let details = HealthDetails {
        channels: state.config.channels.len(),
        models: state.config.list_models().len(),
        adaptors: state.relay.registry().len(),
        uptime_seconds: uptime_seconds(),
    };
    let ready = details.models > 0 && details.adaptors > 0;
    let response = health_response(if ready { "healthy" } else { "not_ready" }, Some(details));

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Liveness check
///
/// GET /health/live
pub async fn liveness_check() -> Json<HealthResponse> {
    debug!("Executing liveness check");
    Json(health_response("alive", None))
}

fn health_response(status: &str, details: Option<HealthDetails>) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        details,
    }
}

fn uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, Settings};
    use crate::services::RelayService;

    fn test_state(config: &str) -> Arc<AppState> {
        let settings = Settings::default();
        let relay = RelayService::from_settings(&settings).unwrap();
        Arc::new(AppState {
            settings,
            config: AppConfig::parse(config).unwrap(),
            relay,
        })
    }

    #[tokio::test]
    async fn test_health_check_reports_counts() {
        let state = test_state(
            r#"{"channels": {"main": {"type": "openai", "baseUrl": "https://api.openai.com", "apiKey": "k", "models": ["gpt-4o", "gpt-4o-mini"]}}}"#,
        );

        let Json(response) = health_check(State(state)).await.unwrap();
        assert_eq!(response.status, "healthy");
        assert_eq!(response.service, "relaygate");
        let details = response.details.unwrap();
        assert_eq!(details.channels, 1);
        assert_eq!(details.models, 2);
        assert_eq!(details.adaptors, 18);
    }

    #[tokio::test]
    async fn test_liveness_check() {
        let Json(response) = liveness_check().await;
        assert_eq!(response.status, "alive");
        assert!(response.details.is_none());
    }
}
