//! # marionette-auth
//!
//! Capability tokens for Marionette connections.
//!
//! A token is an HS256 JWT carrying `{role, session, exp, jti}`. The
//! [`TokenAuthenticator`] checks a token presented at upgrade time; the
//! [`TokenIssuer`] mints host/avatar token pairs for a new session.

#![deny(unsafe_code)]

pub mod claims;
pub mod errors;
pub mod issuer;
pub mod verifier;

pub use claims::TokenClaims;
pub use errors::AuthError;
pub use issuer::{TokenIssuer, TokenPair};
pub use verifier::TokenAuthenticator;
