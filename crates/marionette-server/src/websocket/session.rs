//! WebSocket session lifecycle: one admitted client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use marionette_core::{ClientId, Role, SessionId};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::connection::{ClientConnection, Outbound};
use super::gate::Rejection;
use super::handler::route_frame;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::broker::{Broker, Client};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_REJECTED_TOTAL,
};

/// Close code sent to every client when the server shuts down.
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long a closing socket may take to flush its final frames.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Per-connection tuning.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    /// Liveness probe interval.
    pub heartbeat_interval: Duration,
    /// Outbound channel capacity, in frames.
    pub send_buffer: usize,
}

/// Close a refused socket without joining it to any room.
pub async fn reject(mut ws: WebSocket, rejection: Rejection) {
    counter!(WS_REJECTED_TOTAL, "reason" => rejection.reason()).increment(1);
    info!(code = rejection.code(), reason = rejection.reason(), "rejected connection");
    let frame = CloseFrame {
        code: rejection.code(),
        reason: Utf8Bytes::from_static(rejection.reason()),
    };
    if ws.send(Message::Close(Some(frame))).await.is_ok() {
        // Give the peer a moment to echo the close.
        let _ = tokio::time::timeout(CLOSE_GRACE, ws.recv()).await;
    }
}

/// Run a WebSocket session for an admitted client.
///
/// 1. Registers the client with the broker (an avatar drains its offline queue)
/// 2. Routes inbound text frames through [`route_frame`]
/// 3. Forwards broker output via the outbound channel
/// 4. Probes liveness and drops half-open peers
/// 5. Leaves the broker on disconnect, abandoning the host's pending commands
#[instrument(skip_all, fields(role = %role, session = %session))]
pub async fn run_ws_session(
    ws: WebSocket,
    role: Role,
    session: SessionId,
    broker: Broker,
    options: SessionOptions,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Outbound>(options.send_buffer.max(1));
    let connection = Arc::new(ClientConnection::new(ClientId::generate(), send_tx));
    let client = Client::new(connection.clone(), role, session);

    counter!(WS_CONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let writer = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            let (message, last) = match frame {
                Outbound::Text(text) => {
                    (Message::Text(Utf8Bytes::from(text.as_str().to_owned())), false)
                }
                Outbound::Ping => (Message::Ping(Vec::new().into()), false),
                Outbound::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: Utf8Bytes::from_static(reason),
                    })),
                    true,
                ),
            };
            if ws_tx.send(message).await.is_err() || last {
                break;
            }
        }
    });

    broker.join(client.clone());

    let heartbeat = run_heartbeat(connection.clone(), options.heartbeat_interval, cancel.clone());
    tokio::pin!(heartbeat);

    let result = loop {
        tokio::select! {
            result = &mut heartbeat => break result,
            frame = ws_rx.next() => {
                let Some(Ok(message)) = frame else {
                    break HeartbeatResult::Closed;
                };
                connection.mark_alive();
                match message {
                    Message::Text(text) => {
                        let _ = route_frame(text.as_str(), &client, &broker);
                    }
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            let _ = route_frame(text, &client, &broker);
                        }
                        Err(_) => debug!(client_id = %client.id, len = data.len(), "dropping non-UTF8 binary frame"),
                    },
                    Message::Close(_) => {
                        debug!(client_id = %client.id, "client sent close frame");
                        break HeartbeatResult::Closed;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    };

    broker.leave(&client);

    match result {
        HeartbeatResult::Cancelled => {
            let _ = connection.close(CLOSE_GOING_AWAY, "server shutting down");
            let _ = tokio::time::timeout(CLOSE_GRACE, writer).await;
        }
        HeartbeatResult::TimedOut => {
            info!(client_id = %client.id, "client unresponsive, disconnecting");
            writer.abort();
        }
        HeartbeatResult::Closed => writer.abort(),
    }

    info!(
        client_id = %client.id,
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}
