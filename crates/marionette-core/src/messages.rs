//! Wire-format types for the host/avatar protocol.
//!
//! Every frame is one JSON object discriminated by its `kind` field:
//!
//! | kind    | direction                    | acknowledged |
//! |---------|------------------------------|--------------|
//! | `cmd`   | host → broker → avatar(s)    | yes          |
//! | `ack`   | avatar → broker → host       | n/a          |
//! | `state` | avatar → broker → all hosts  | no           |
//!
//! Parsing yields either a complete [`Message`] variant or an error; there is
//! no partially-typed intermediate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{ACK_TIMEOUT_ERROR, PROTOCOL_VERSION};

/// Role granted to a connection by its capability token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Controller that issues commands and observes state.
    Host,
    /// Renderer that executes commands and reports state.
    Avatar,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Avatar => "avatar",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Message {
    /// Host-issued instruction that must be acknowledged.
    #[serde(rename = "cmd")]
    Command(CommandMessage),
    /// Acknowledgement for a command id.
    #[serde(rename = "ack")]
    Ack(AckMessage),
    /// Unacknowledged render-state snapshot.
    #[serde(rename = "state")]
    State(StateMessage),
}

impl Message {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The `kind` discriminator of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "cmd",
            Self::Ack(_) => "ack",
            Self::State(_) => "state",
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn default_version() -> u32 {
    PROTOCOL_VERSION
}

/// Command sent by a host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Protocol version.
    #[serde(default = "default_version", alias = "v")]
    pub version: u32,
    /// Command id; the broker assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Target session. Always overwritten with the sender's session.
    #[serde(default)]
    pub session: String,
    /// Action name, e.g. `setScene`.
    pub action: String,
    /// Action arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, alias = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl CommandMessage {
    /// Build a command for `action` with no id, session, or timestamp set.
    pub fn new(action: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: None,
            session: String::new(),
            action: action.into(),
            payload,
            timestamp: None,
        }
    }

    /// The command id, treating an empty string as absent.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Acknowledgement sent by an avatar, or synthesized by the broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AckMessage {
    /// Protocol version.
    #[serde(default, alias = "v", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Id of the acknowledged command.
    pub id: String,
    /// Whether the avatar executed the command successfully.
    pub ok: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(default, alias = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Failure description when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckMessage {
    /// Successful ack for `id`.
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            version: None,
            id: id.into(),
            ok: true,
            timestamp: None,
            error: None,
        }
    }

    /// Negative ack for `id` carrying an error string.
    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            version: None,
            id: id.into(),
            ok: false,
            timestamp: None,
            error: Some(error.into()),
        }
    }

    /// Synthetic ack sent to the host once retries are exhausted.
    pub fn timed_out(id: impl Into<String>, version: u32, timestamp: i64) -> Self {
        Self {
            version: Some(version),
            timestamp: Some(timestamp),
            ..Self::failure(id, ACK_TIMEOUT_ERROR)
        }
    }
}

/// Render-state snapshot sent by an avatar.
///
/// Fields other than the well-known ones are preserved in `extra` and
/// forwarded verbatim.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    /// Protocol version.
    #[serde(default, alias = "v", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Session; always overwritten with the sender's session.
    #[serde(default)]
    pub session: String,
    /// Current scene name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    /// Current theme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, alias = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Free-form additional fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
