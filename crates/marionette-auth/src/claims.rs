//! Token claim set.

use marionette_core::{Role, SessionId};
use serde::{Deserialize, Serialize};

/// Claims carried by a capability token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Role the bearer joins as.
    pub role: Role,
    /// Session the bearer may join.
    pub session: SessionId,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
    /// Unique token id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}
