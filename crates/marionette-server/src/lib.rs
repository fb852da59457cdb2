//! # marionette-server
//!
//! Host/avatar command broker over WebSocket.
//!
//! - Broker: rooms per session, pending-command table with ack retries,
//!   bounded offline queue per session, state fan-out to hosts
//! - `WebSocket` gateway: origin and token gate, heartbeat, frame routing
//! - HTTP endpoints: session minting, health check, Prometheus metrics
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod broker;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session_api;
pub mod shutdown;
pub mod websocket;

pub use broker::{Broker, BrokerConfig, BrokerStats, Client};
pub use config::ServerConfig;
pub use server::MarionetteServer;
