//! Server configuration.

use std::time::Duration;

use marionette_core::constants::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_WS_PATH,
};
use marionette_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the Marionette server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// WebSocket upgrade path.
    pub ws_path: String,
    /// Allowed `Origin` prefixes. Empty allows every origin.
    pub allowed_origins: Vec<String>,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound buffer, in frames.
    pub send_buffer: usize,
    /// Public WebSocket URL advertised by `POST /session`.
    pub ws_public_url: Option<String>,
    /// Public base URL of the host and avatar pages.
    pub public_app_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: DEFAULT_WS_PATH.into(),
            allowed_origins: Vec::new(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            max_message_size: DEFAULT_MAX_PAYLOAD_BYTES,
            send_buffer: 256,
            ws_public_url: None,
            public_app_url: None,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            ws_path: settings.ws_path.clone(),
            allowed_origins: settings.allowed_origins.clone(),
            heartbeat_interval_ms: settings.heartbeat_interval_ms,
            max_message_size: settings.max_payload_bytes,
            send_buffer: settings.send_buffer.max(1),
            ws_public_url: settings.ws_public_url.clone(),
            public_app_url: settings.public_app_url.clone(),
        }
    }
}

impl ServerConfig {
    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Whether a connection presenting `origin` may upgrade.
    ///
    /// An empty allow-list admits everything, including a missing origin.
    /// Otherwise the origin must start with one of the listed prefixes.
    pub fn is_origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|origin| {
            self.allowed_origins
                .iter()
                .any(|allowed| origin.starts_with(allowed.as_str()))
        })
    }
}
