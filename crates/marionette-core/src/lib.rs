//! # marionette-core
//!
//! Foundation types shared by every Marionette crate:
//!
//! - [`ids`]: branded ID newtypes (`ClientId`, `SessionId`)
//! - [`messages`]: the `cmd` / `ack` / `state` wire envelope
//! - [`constants`]: protocol defaults (timeouts, queue sizes, close codes)
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;
pub mod messages;

pub use ids::{ClientId, SessionId};
pub use messages::{AckMessage, CommandMessage, Message, Role, StateMessage};

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_after_2024() {
        assert!(now_ms() > 1_704_067_200_000);
    }
}
