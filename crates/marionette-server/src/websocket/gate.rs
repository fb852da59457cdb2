//! Pre-join admission: origin allow-list, then capability token.

use marionette_auth::{TokenAuthenticator, TokenClaims};
use marionette_core::constants::{CLOSE_FORBIDDEN, CLOSE_UNAUTHORIZED};

use crate::config::ServerConfig;

/// Why a connection was refused. The socket is closed with
/// [`Rejection::code`] before it ever joins a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// `Origin` missing or not on the allow-list.
    Forbidden,
    /// Token missing, malformed, wrongly signed, or expired.
    Unauthorized,
}

impl Rejection {
    /// WebSocket close code.
    pub fn code(self) -> u16 {
        match self {
            Self::Forbidden => CLOSE_FORBIDDEN,
            Self::Unauthorized => CLOSE_UNAUTHORIZED,
        }
    }

    /// Close reason, also used as the metrics label.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
        }
    }
}

/// Decide whether an upgrade request may join.
///
/// The origin is checked before the token, so a foreign page never learns
/// whether its token was valid.
pub fn admit(
    config: &ServerConfig,
    authenticator: &TokenAuthenticator,
    origin: Option<&str>,
    token: Option<&str>,
) -> Result<TokenClaims, Rejection> {
    if !config.is_origin_allowed(origin) {
        return Err(Rejection::Forbidden);
    }
    token
        .filter(|t| !t.is_empty())
        .and_then(|t| authenticator.verify(t))
        .ok_or(Rejection::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use marionette_auth::TokenIssuer;
    use marionette_core::{Role, SessionId};

    const SECRET: &[u8] = b"gate-secret";

    fn config(origins: &[&str]) -> ServerConfig {
        ServerConfig {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            ..ServerConfig::default()
        }
    }

    fn token(role: Role) -> String {
        TokenIssuer::new(SECRET, Duration::from_secs(60))
            .issue(role, &SessionId::from("s1"))
            .unwrap()
    }

    #[test]
    fn valid_token_is_admitted() {
        let auth = TokenAuthenticator::new(SECRET);
        let claims = admit(&config(&[]), &auth, None, Some(&token(Role::Avatar))).unwrap();
        assert_eq!(claims.role, Role::Avatar);
        assert_eq!(claims.session.as_str(), "s1");
    }

    #[test]
    fn missing_or_empty_token_is_unauthorized() {
        let auth = TokenAuthenticator::new(SECRET);
        assert_eq!(
            admit(&config(&[]), &auth, None, None).unwrap_err(),
            Rejection::Unauthorized
        );
        assert_eq!(
            admit(&config(&[]), &auth, None, Some("")).unwrap_err(),
            Rejection::Unauthorized
        );
    }

    #[test]
    fn foreign_signature_is_unauthorized() {
        let auth = TokenAuthenticator::new(b"other");
        let err = admit(&config(&[]), &auth, None, Some(&token(Role::Host))).unwrap_err();
        assert_eq!(err.code(), 4401);
        assert_eq!(err.reason(), "unauthorized");
    }

    #[test]
    fn origin_checked_before_token() {
        let auth = TokenAuthenticator::new(SECRET);
        let cfg = config(&["https://app.example"]);
        let err = admit(&cfg, &auth, Some("https://evil.example"), None).unwrap_err();
        assert_eq!(err, Rejection::Forbidden);
        assert_eq!(err.code(), 4403);
        assert!(admit(&cfg, &auth, Some("https://app.example"), Some(&token(Role::Host))).is_ok());
    }
}
