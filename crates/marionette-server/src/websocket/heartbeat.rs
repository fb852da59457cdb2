//! Heartbeat ping/pong liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The peer did not answer the previous probe.
    TimedOut,
    /// The outbound channel closed; the connection is already going away.
    Closed,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Run heartbeat probes for a connection.
///
/// At each `interval` tick the alive flag is checked and reset. A peer that
/// has not answered the previous Ping (with a Pong or any other frame) is
/// considered half-open and `HeartbeatResult::TimedOut` is returned; otherwise
/// a fresh Ping is queued.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !connection.check_alive() {
                    debug!(
                        client_id = %connection.id,
                        silent_ms = connection.last_seen_elapsed().as_millis(),
                        "no pong since last probe"
                    );
                    return HeartbeatResult::TimedOut;
                }
                if !connection.send_ping() && connection.is_closed() {
                    return HeartbeatResult::Closed;
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
