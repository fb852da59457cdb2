//! Branded ID newtypes.
//!
//! Connections and sessions are both identified by strings on the wire; the
//! newtypes keep a session id from being passed where a client id is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

branded_id!(
    /// Identifier assigned to a connection once it authenticates.
    ClientId
);

branded_id!(
    /// Opaque session identifier shared by a host and its avatars.
    SessionId
);

impl ClientId {
    /// Generate a fresh client ID (UUID v7, time-ordered).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }
}

impl SessionId {
    /// Mint a new random session ID (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Generate a command ID for a host command that arrived without one.
pub fn command_id() -> String {
    Uuid::now_v7().to_string()
}
