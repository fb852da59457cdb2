//! # marionette
//!
//! Broker binary: loads settings, installs logging and metrics, and serves
//! the WebSocket broker until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use marionette_auth::{TokenAuthenticator, TokenIssuer};
use marionette_core::logging::{LogFormat, init_subscriber};
use marionette_server::shutdown::DRAIN_TIMEOUT;
use marionette_server::{Broker, BrokerConfig, MarionetteServer, ServerConfig};
use marionette_settings::MarionetteSettings;

/// Marionette host/avatar command broker.
#[derive(Parser, Debug)]
#[command(name = "marionette", about = "Host/avatar command broker over WebSocket")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.marionette/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<MarionetteSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(marionette_settings::settings_path);
        let mut settings = marionette_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

/// Build the server from loaded settings.
fn build_server(
    settings: &MarionetteSettings,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<MarionetteServer> {
    let ttl = Duration::from_secs(settings.auth.token_ttl_secs);
    let issuer = TokenIssuer::from_secret(settings.auth.secret.as_deref(), ttl)
        .context("JWT_SECRET must be set")?;
    let secret = settings.auth.secret.as_deref().unwrap_or_default();
    let authenticator = TokenAuthenticator::new(secret.as_bytes());

    Ok(MarionetteServer::new(
        ServerConfig::from(&settings.server),
        Broker::new(BrokerConfig::from(&settings.broker)),
        issuer,
        authenticator,
        metrics_handle,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    let format = LogFormat::parse(&settings.logging.format).unwrap_or_default();
    init_subscriber(&settings.logging.level, format);

    let metrics_handle = marionette_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = build_server(&settings, metrics_handle)?;

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        ack_timeout_ms = settings.broker.ack_timeout_ms,
        ack_max_retries = settings.broker.ack_max_retries,
        max_queue_size = settings.broker.max_queue_size,
        "marionette listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if server
        .shutdown()
        .shutdown_and_wait(handle, DRAIN_TIMEOUT)
        .await
    {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}
