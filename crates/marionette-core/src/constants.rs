//! Protocol defaults.

/// Wire protocol version stamped on broker-generated frames.
pub const PROTOCOL_VERSION: u32 = 1;

/// How long to wait for an ack before retrying a command.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5_000;

/// Retries after the initial dispatch before a command fails.
pub const DEFAULT_ACK_MAX_RETRIES: u32 = 3;

/// Offline queue capacity per session.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50;

/// Interval between liveness probes.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;

/// Upgrade path for the WebSocket endpoint.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Maximum accepted inbound frame size.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Default capability token lifetime.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 600;

/// Close code sent when the capability token is missing, invalid, or expired.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Close code sent when the `Origin` header is not on the allow-list.
pub const CLOSE_FORBIDDEN: u16 = 4403;

/// Error string carried by the synthetic ack sent when retries run out.
pub const ACK_TIMEOUT_ERROR: &str = "ack_timeout";
