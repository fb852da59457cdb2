//! Token verification at connection upgrade.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use crate::claims::TokenClaims;

/// Verifies capability tokens signed with a shared HMAC secret.
pub struct TokenAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenAuthenticator {
    /// Create an authenticator for tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Check signature and expiry and extract the claims.
    ///
    /// Returns `None` for any failure: malformed token, bad signature,
    /// expired, or claims that do not match [`TokenClaims`].
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        if token.is_empty() {
            return None;
        }
        match decode::<TokenClaims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "token rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use jsonwebtoken::{EncodingKey, Header, encode};
    use marionette_core::{Role, SessionId};

    use crate::issuer::TokenIssuer;

    const SECRET: &[u8] = b"test-secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::from_secs(600))
    }

    fn now_secs() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap()
    }

    #[test]
    fn valid_token_yields_claims() {
        let token = issuer().issue(Role::Avatar, &SessionId::from("s1")).unwrap();
        let claims = TokenAuthenticator::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.role, Role::Avatar);
        assert_eq!(claims.session.as_str(), "s1");
        assert!(claims.jti.is_some());
        assert!(claims.exp > now_secs());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issuer().issue(Role::Host, &SessionId::from("s1")).unwrap();
        assert!(TokenAuthenticator::new(b"other").verify(&token).is_none());
    }

    #[test]
    fn expired_token_rejected() {
        let token = issuer()
            .issue_with_expiry(Role::Host, &SessionId::from("s1"), now_secs() - 10)
            .unwrap();
        assert!(TokenAuthenticator::new(SECRET).verify(&token).is_none());
    }

    #[test]
    fn garbage_rejected() {
        let auth = TokenAuthenticator::new(SECRET);
        assert!(auth.verify("").is_none());
        assert!(auth.verify("not-a-jwt").is_none());
        assert!(auth.verify("a.b.c").is_none());
    }

    #[test]
    fn tampered_payload_rejected() {
        let token = issuer().issue(Role::Avatar, &SessionId::from("s1")).unwrap();
        let other = issuer().issue(Role::Host, &SessionId::from("s1")).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert!(TokenAuthenticator::new(SECRET).verify(&forged).is_none());
    }

    #[test]
    fn unknown_role_rejected() {
        let claims = serde_json::json!({
            "role": "admin",
            "session": "s1",
            "exp": now_secs() + 60,
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(TokenAuthenticator::new(SECRET).verify(&token).is_none());
    }

    #[test]
    fn missing_expiry_rejected() {
        let claims = serde_json::json!({ "role": "host", "session": "s1" });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(TokenAuthenticator::new(SECRET).verify(&token).is_none());
    }
}
