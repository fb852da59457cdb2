//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use marionette_core::ClientId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A frame queued for the connection's write task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Text frame. Shared so one serialized buffer can fan out to many peers.
    Text(Arc<String>),
    /// Liveness probe.
    Ping,
    /// Close frame; the write task stops after sending it.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: &'static str,
    },
}

/// Handle to one connected WebSocket peer.
///
/// Everything the broker sends goes through [`ClientConnection::send`], a
/// non-blocking `try_send` into the bounded outbound channel.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ClientId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Outbound>,
    /// When this connection was established.
    connected_at: Instant,
    /// Whether the peer has shown signs of life since the last probe.
    is_alive: AtomicBool,
    /// When the last Pong (or any inbound frame) was received.
    last_seen: Mutex<Instant>,
    /// Count of frames dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ClientId, tx: mpsc::Sender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.push(Outbound::Text(frame))
    }

    /// Queue a liveness probe.
    pub fn send_ping(&self) -> bool {
        self.push(Outbound::Ping)
    }

    /// Queue a close frame.
    pub fn close(&self, code: u16, reason: &'static str) -> bool {
        self.push(Outbound::Close { code, reason })
    }

    fn push(&self, frame: Outbound) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the write side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or inbound frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Duration since the peer was last heard from.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (ClientConnection, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(ClientId::from("conn_1"), tx);
        (conn, rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("hello".into())));
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, Outbound::Text(Arc::new("hello".into())));
    }

    #[test]
    fn send_to_closed_channel_returns_false() {
        let (conn, rx) = make_connection();
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert!(conn.is_closed());
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_returns_false() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(ClientId::from("conn_full"), tx);
        assert!(conn.send(Arc::new("msg1".into())));
        assert!(!conn.send(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn ping_and_close_are_queued() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send_ping());
        assert!(conn.close(4401, "unauthorized"));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Close {
                code: 4401,
                reason: "unauthorized"
            }
        );
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection();
        // Initially alive
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn shared_buffer_is_not_copied() {
        let (conn, mut rx) = make_connection();
        let frame = Arc::new("payload".to_string());
        assert!(conn.send(frame.clone()));
        let Outbound::Text(received) = rx.try_recv().unwrap() else {
            panic!("expected text frame");
        };
        assert!(Arc::ptr_eq(&frame, &received));
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection();
        let age1 = conn.age();
        std::thread::sleep(Duration::from_millis(5));
        assert!(conn.age() > age1);
        assert!(conn.last_seen_elapsed() >= Duration::from_millis(5));
    }
}
