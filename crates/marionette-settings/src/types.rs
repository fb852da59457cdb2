//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only has
//! to name the keys it overrides.

use marionette_core::constants::{
    DEFAULT_ACK_MAX_RETRIES, DEFAULT_ACK_TIMEOUT_MS, DEFAULT_HEARTBEAT_INTERVAL_MS,
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_TOKEN_TTL_SECS, DEFAULT_WS_PATH,
};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarionetteSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Command delivery settings.
    pub broker: BrokerSettings,
    /// Capability token settings.
    pub auth: AuthSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl MarionetteSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.server.ws_path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "wsPath must start with '/': {}",
                self.server.ws_path
            )));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "heartbeatIntervalMs must be positive".into(),
            ));
        }
        if self.broker.ack_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "ackTimeoutMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Path of the WebSocket upgrade endpoint.
    pub ws_path: String,
    /// Allowed `Origin` prefixes. Empty allows every origin.
    pub allowed_origins: Vec<String>,
    /// Liveness probe interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_payload_bytes: usize,
    /// Per-connection outbound buffer, in frames.
    pub send_buffer: usize,
    /// Public WebSocket URL handed to clients by `POST /session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_public_url: Option<String>,
    /// Public base URL of the host/avatar pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_app_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ws_path: DEFAULT_WS_PATH.to_string(),
            allowed_origins: Vec::new(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            send_buffer: 256,
            ws_public_url: None,
            public_app_url: None,
        }
    }
}

/// Command delivery settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// How long to wait for an ack before retrying, in milliseconds.
    pub ack_timeout_ms: u64,
    /// Retries after the initial dispatch.
    pub ack_max_retries: u32,
    /// Offline queue capacity per session.
    pub max_queue_size: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            ack_max_retries: DEFAULT_ACK_MAX_RETRIES,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

/// Capability token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret used to sign and verify tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// `"compact"` or `"json"`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: MarionetteSettings =
            serde_json::from_str(r#"{"broker":{"ackTimeoutMs":100}}"#).unwrap();
        assert_eq!(settings.broker.ack_timeout_ms, 100);
        assert_eq!(settings.broker.ack_max_retries, DEFAULT_ACK_MAX_RETRIES);
        assert_eq!(settings.server.ws_path, "/ws");
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(MarionetteSettings::default()).unwrap();
        assert_eq!(value["server"]["wsPath"], "/ws");
        assert_eq!(value["broker"]["maxQueueSize"], 50);
        assert!(value["auth"].get("secret").is_none());
    }

    #[test]
    fn defaults_validate() {
        assert!(MarionetteSettings::default().validate().is_ok());
    }

    #[test]
    fn relative_ws_path_rejected() {
        let mut settings = MarionetteSettings::default();
        settings.server.ws_path = "ws".into();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("wsPath"));
    }

    #[test]
    fn zero_ack_timeout_rejected() {
        let mut settings = MarionetteSettings::default();
        settings.broker.ack_timeout_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_heartbeat_rejected() {
        let mut settings = MarionetteSettings::default();
        settings.server.heartbeat_interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
