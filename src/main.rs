//! RelayGate Server
//!
//! HTTP gateway that relays canonical OpenAI-style requests to the
//! configured upstream vendors

use anyhow::{Context, Result};
use relaygate::config::{settings::LoggingConfig, AppConfig, Settings};
use relaygate::create_router;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment settings first: they carry the log configuration
    let settings = Settings::new().context("Failed to load server settings")?;

    init_logging(&settings.logging)?;
    info!("{}", relaygate::version_info());

    // Channel configuration from JSON file (required)
    let mut app_config = AppConfig::load_default().context("Failed to load channel configuration")?;
    info!("📁 Channel configuration loaded: {} channels", app_config.channels.len());

    if let Some(host) = &settings.server.host {
        app_config.server.host = host.clone();
    }
    if let Some(port) = settings.server.port {
        app_config.server.port = port;
    }

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let app = create_router(settings, app_config).await?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🚀 RelayGate server started!");
    info!("📝 Health check: http://{}/health", addr);
    info!("🔄 Relay endpoint: http://{}/v1/chat/completions", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    Ok(())
}

/// Initialize logging system
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if config.format == "json" {
        // JSON format logs (production environment)
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(config.level.as_str())
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(config.level.as_str())
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    info!("Logging system initialized");
    Ok(())
}
