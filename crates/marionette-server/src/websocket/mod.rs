//! WebSocket connection management, heartbeat, and frame routing.

pub mod connection;
pub mod gate;
pub mod handler;
pub mod heartbeat;
pub mod session;
