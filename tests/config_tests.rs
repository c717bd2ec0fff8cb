//! Configuration module tests

use relaygate::config::{AppConfig, Settings};
use relaygate::models::ChannelType;
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"{
    "server": {"host": "0.0.0.0", "port": 9000},
    "channels": {
        "azure-east": {
            "type": "azure",
            "baseUrl": "https://east.openai.azure.com",
            "apiKey": "az-key",
            "apiVersion": "2024-03-01-preview",
            "models": ["gpt-4o"]
        },
        "deepseek": {
            "type": "deepseek",
            "baseUrl": "https://api.deepseek.com",
            "apiKey": "ds-key",
            "models": ["deepseek-chat"],
            "modelMapping": {"ds": "deepseek-chat"}
        },
        "refact": {
            "type": "refact",
            "apiKey": "rf-key",
            "models": ["gpt-4.1"]
        }
    }
}"#;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_load_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.channels.len(), 3);
    assert_eq!(config.channels["azure-east"].channel_type, ChannelType::Azure);
    assert_eq!(
        config.channels["azure-east"].api_version.as_deref(),
        Some("2024-03-01-preview")
    );
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(AppConfig::load(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_channel_for_model_and_mapping() {
    let config = AppConfig::parse(CONFIG).unwrap();

    let (name, channel) = config.channel_for_model("ds").unwrap();
    assert_eq!(name, "deepseek");
    assert_eq!(channel.map_model("ds"), "deepseek-chat");
    assert_eq!(channel.map_model("deepseek-chat"), "deepseek-chat");

    assert!(config.channel_for_model("claude-3").is_none());
}

#[test]
fn test_list_models_sorted() {
    let config = AppConfig::parse(CONFIG).unwrap();
    assert_eq!(config.list_models(), vec!["deepseek-chat", "ds", "gpt-4.1", "gpt-4o"]);
}

#[test]
fn test_azure_requires_api_version() {
    let config = r#"{"channels": {"az": {"type": "azure", "baseUrl": "https://x.openai.azure.com", "apiKey": "k", "models": ["gpt-4o"]}}}"#;
    assert!(AppConfig::parse(config).is_err());
}

#[test]
fn test_base_url_required_except_refact() {
    let missing = r#"{"channels": {"ds": {"type": "deepseek", "apiKey": "k", "models": ["deepseek-chat"]}}}"#;
    assert!(AppConfig::parse(missing).is_err());

    let refact = r#"{"channels": {"rf": {"type": "refact", "apiKey": "k", "models": ["gpt-4.1"]}}}"#;
    assert!(AppConfig::parse(refact).is_ok());
}

#[test]
fn test_unknown_channel_type_rejected() {
    let config = r#"{"channels": {"x": {"type": "carrier-pigeon", "baseUrl": "https://x", "apiKey": "k", "models": ["m"]}}}"#;
    assert!(AppConfig::parse(config).is_err());
}

#[test]
fn test_empty_channels_rejected() {
    assert!(AppConfig::parse(r#"{"channels": {}}"#).is_err());
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::from_lookup(lookup(&[])).unwrap();
    assert_eq!(settings.upstream.timeout, 60);
    assert_eq!(settings.upstream.stream_timeout, 600);
    assert!(!settings.upstream.debug);
    assert!(settings.server.host.is_none());
    assert_eq!(settings.logging.format, "text");
}

#[test]
fn test_settings_overrides() {
    let settings = Settings::from_lookup(lookup(&[
        ("SERVER_PORT", "8181"),
        ("REQUEST_TIMEOUT", "15"),
        ("RELAY_DEBUG", "yes"),
        ("LOG_FORMAT", "json"),
        ("ATTRIBUTION_TITLE", "Acme"),
    ]))
    .unwrap();

    assert_eq!(settings.server.port, Some(8181));
    assert_eq!(settings.upstream.timeout, 15);
    assert!(settings.upstream.debug);
    assert_eq!(settings.logging.format, "json");
    assert_eq!(settings.attribution.title, "Acme");
}

#[test]
fn test_settings_validation() {
    assert!(Settings::from_lookup(lookup(&[("SERVER_PORT", "0")])).is_err());
    assert!(Settings::from_lookup(lookup(&[("SERVER_PORT", "not-a-port")])).is_err());
    assert!(Settings::from_lookup(lookup(&[("REQUEST_TIMEOUT", "0")])).is_err());
    assert!(Settings::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    assert!(Settings::from_lookup(lookup(&[("RELAY_DEBUG", "maybe")])).is_err());
}
