//! Inbound frame routing. Parses one text frame and hands it to the broker.

use marionette_core::Message;
use tracing::debug;

use crate::broker::{Broker, Client};

/// What happened to an inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the broker.
    Routed(&'static str),
    /// Not valid JSON, or not a known `kind`.
    Malformed,
    /// Valid frame the sender's role may not send.
    Ignored(&'static str),
}

/// Route one text frame from `client`.
///
/// Malformed frames and role violations are dropped without a reply; the
/// connection stays open.
pub fn route_frame(text: &str, client: &Client, broker: &Broker) -> RouteOutcome {
    let message = match Message::parse(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(client_id = %client.id, error = %e, "dropping malformed frame");
            return RouteOutcome::Malformed;
        }
    };

    let kind = message.kind();
    match message {
        Message::Command(cmd) if client.is_host() => broker.handle_command(client, cmd),
        Message::Ack(ack) if client.is_avatar() => broker.handle_ack(client, ack),
        Message::State(state) if client.is_avatar() => broker.handle_state(client, state),
        _ => {
            debug!(client_id = %client.id, role = %client.role, kind, "frame not allowed for role");
            return RouteOutcome::Ignored(kind);
        }
    }
    RouteOutcome::Routed(kind)
}
