//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup; a second install fails.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a private recorder, for servers that must not touch
/// the global one.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections accepted and joined (counter, labels: role).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connections refused at the gate (counter, labels: reason).
pub const WS_REJECTED_TOTAL: &str = "ws_rejected_total";
/// Connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Commands accepted from hosts (counter).
pub const BROKER_COMMANDS_TOTAL: &str = "broker_commands_total";
/// Command dispatch attempts, including retries (counter).
pub const BROKER_DISPATCHES_TOTAL: &str = "broker_dispatches_total";
/// Acks forwarded to hosts (counter).
pub const BROKER_ACKS_TOTAL: &str = "broker_acks_total";
/// Commands failed with `ack_timeout` (counter).
pub const BROKER_ACK_TIMEOUTS_TOTAL: &str = "broker_ack_timeouts_total";
/// Commands dropped from a full offline queue (counter).
pub const BROKER_QUEUE_EVICTIONS_TOTAL: &str = "broker_queue_evictions_total";
/// State frames fanned out to hosts (counter).
pub const BROKER_STATES_TOTAL: &str = "broker_states_total";
/// Sessions minted through `POST /session` (counter).
pub const SESSIONS_MINTED_TOTAL: &str = "sessions_minted_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_handle_renders() {
        let handle = detached_handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_REJECTED_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            BROKER_COMMANDS_TOTAL,
            BROKER_DISPATCHES_TOTAL,
            BROKER_ACKS_TOTAL,
            BROKER_ACK_TIMEOUTS_TOTAL,
            BROKER_QUEUE_EVICTIONS_TOTAL,
            BROKER_STATES_TOTAL,
            SESSIONS_MINTED_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
