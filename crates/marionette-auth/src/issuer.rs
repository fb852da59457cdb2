//! Token issuance for the session-minting endpoint.

use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use marionette_core::{Role, SessionId};
use uuid::Uuid;

use crate::claims::TokenClaims;
use crate::errors::AuthError;

/// Host and avatar tokens for one session.
#[derive(Clone, Debug)]
pub struct TokenPair {
    /// Token granting the host role.
    pub host: String,
    /// Token granting the avatar role.
    pub avatar: String,
}

/// Signs capability tokens with a shared HMAC secret.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer from a raw secret.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Create an issuer from an optional configured secret.
    pub fn from_secret(secret: Option<&str>, ttl: Duration) -> Result<Self, AuthError> {
        match secret {
            Some(s) if !s.is_empty() => Ok(Self::new(s.as_bytes(), ttl)),
            _ => Err(AuthError::MissingSecret),
        }
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `role` in `session`, expiring after the TTL.
    pub fn issue(&self, role: Role, session: &SessionId) -> Result<String, AuthError> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        self.issue_with_expiry(role, session, now + self.ttl.as_secs())
    }

    /// Issue a token with an explicit expiry (seconds since the epoch).
    pub fn issue_with_expiry(
        &self,
        role: Role,
        session: &SessionId,
        exp: u64,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            role,
            session: session.clone(),
            exp,
            jti: Some(Uuid::new_v4().to_string()),
        };
        Ok(encode(&Header::default(), &claims, &self.key)?)
    }

    /// Issue a host token and an avatar token for `session`.
    pub fn issue_pair(&self, session: &SessionId) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            host: self.issue(Role::Host, session)?,
            avatar: self.issue(Role::Avatar, session)?,
        })
    }
}
