//! Auth error types.

/// Errors that can occur while issuing tokens.
///
/// Verification never fails with an error; see
/// [`TokenAuthenticator::verify`](crate::TokenAuthenticator::verify).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No signing secret configured.
    #[error("token secret is not configured")]
    MissingSecret,

    /// JWT encoding failed.
    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_display() {
        assert_eq!(
            AuthError::MissingSecret.to_string(),
            "token secret is not configured"
        );
    }
}
