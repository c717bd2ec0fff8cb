//! Error handling module tests

use axum::response::IntoResponse;
use relaygate::models::ApiError;
use relaygate::utils::error::helpers::*;
use relaygate::utils::error::*;
use serde_json::json;

#[test]
fn test_relay_error_status_codes() {
    let test_cases = vec![
        (RelayError::Config("test".to_string()), 500),
        (RelayError::InvalidRequest("test".to_string()), 400),
        (RelayError::Decode("test".to_string()), 500),
        (RelayError::NoContent("test".to_string()), 502),
        (RelayError::Stream("test".to_string()), 500),
        (upstream_error(418, ApiError::default()), 418),
    ];

    for (error, expected_status) in test_cases {
        assert_eq!(error.status_code(), expected_status);
    }
}

#[test]
fn test_relay_error_codes() {
    assert_eq!(config_error("x").code(), "invalid_config");
    assert_eq!(invalid_request("x").code(), "invalid_request");
    assert_eq!(stream_error("x").code(), "stream_failed");
    assert_eq!(RelayError::NoContent("x".into()).error_type(), "no_content_error");
}

#[test]
fn test_upstream_error_preserves_vendor_payload() {
    let vendor = ApiError::new("Model overloaded", "server_error", "overloaded");
    let err: ErrorWithStatusCode = upstream_error(529, vendor.clone()).into();

    assert_eq!(err.status_code, 529);
    assert_eq!(err.error, vendor);
}

#[test]
fn test_empty_upstream_error_synthesized() {
    let err: ErrorWithStatusCode = upstream_error(502, ApiError::default()).into();

    assert_eq!(err.error.message, "bad response status code 502");
    assert_eq!(err.error.error_type, "upstream_error");
    assert_eq!(err.error.code, Some(json!(502)));
}

#[test]
fn test_decode_error_hides_parser_details() {
    let err: ErrorWithStatusCode = RelayError::Decode("expected value at line 1 column 1".into()).into();
    assert_eq!(err.status_code, 500);
    assert_eq!(err.error.message, DECODE_ERROR_MESSAGE);
}

#[test]
fn test_error_serializes_as_envelope() {
    let err: ErrorWithStatusCode = invalid_request("messages must not be empty").into();
    let value = serde_json::to_value(&err).unwrap();

    assert_eq!(value["error"]["type"], "invalid_request_error");
    assert_eq!(value["error"]["code"], "invalid_request");
    assert!(value.get("status_code").is_none());
}

#[test]
fn test_error_into_response_status() {
    let err: ErrorWithStatusCode = upstream_error(429, ApiError::new("slow down", "rate_limit_error", "rate_limit")).into();
    let response = err.into_response();
    assert_eq!(response.status().as_u16(), 429);
}

#[test]
fn test_error_context_trait() {
    let parsed: Result<serde_json::Value, _> = serde_json::from_str("{broken");
    let err = parsed.decode_context("vendor body").unwrap_err();
    assert!(matches!(err, RelayError::Decode(_)));

    let io: Result<(), std::io::Error> = Err(std::io::Error::new(std::io::ErrorKind::Other, "gone"));
    assert!(matches!(io.stream_context("reading frame"), Err(RelayError::Stream(_))));
}
