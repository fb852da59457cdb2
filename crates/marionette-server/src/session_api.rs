//! `POST /session`: mint a session id with a host/avatar token pair and the
//! URLs clients use to reach it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use marionette_auth::{AuthError, TokenIssuer};
use marionette_core::SessionId;
use serde::Serialize;
use serde_json::json;
use url::Url;

/// Response body for a freshly minted session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionResponse {
    /// New session id.
    pub session: SessionId,
    /// WebSocket URL carrying the avatar token.
    pub ws_avatar: String,
    /// WebSocket URL carrying the host token.
    pub ws_host: String,
    /// Avatar page URL.
    pub avatar_page: String,
    /// Host control panel URL.
    pub host_panel: String,
}

/// Errors from the session-minting endpoint.
#[derive(Debug, thiserror::Error)]
pub enum SessionApiError {
    /// A public URL is not configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// A configured public URL does not parse.
    #[error("invalid public url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Token signing failed.
    #[error(transparent)]
    Token(#[from] AuthError),
}

impl IntoResponse for SessionApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidUrl(_) | Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Mint a new session.
pub fn mint_session(
    issuer: &TokenIssuer,
    ws_public_url: Option<&str>,
    public_app_url: Option<&str>,
) -> Result<SessionResponse, SessionApiError> {
    let ws_base = ws_public_url.ok_or(SessionApiError::NotConfigured("WS_PUBLIC_URL"))?;
    let app_base = public_app_url.ok_or(SessionApiError::NotConfigured("PUBLIC_APP_URL"))?;
    let ws_base = Url::parse(ws_base)?;
    let app_base = Url::parse(app_base)?;

    let session = SessionId::generate();
    let tokens = issuer.issue_pair(&session)?;

    let ws_avatar = with_query(ws_base.clone(), &[("token", tokens.avatar.as_str())]);
    let ws_host = with_query(ws_base, &[("token", tokens.host.as_str())]);
    let avatar_page = with_query(
        app_base.join("/avatar")?,
        &[("session", session.as_str()), ("wss", ws_avatar.as_str())],
    );
    let host_panel = with_query(
        app_base.join("/host")?,
        &[("session", session.as_str()), ("wss", ws_host.as_str())],
    );

    Ok(SessionResponse {
        session,
        ws_avatar,
        ws_host,
        avatar_page,
        host_panel,
    })
}

fn with_query(mut url: Url, pairs: &[(&str, &str)]) -> String {
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            let _ = query.append_pair(key, value);
        }
    }
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use marionette_auth::TokenAuthenticator;
    use marionette_core::Role;

    const SECRET: &[u8] = b"mint-secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::from_secs(600))
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn mints_tokens_for_both_roles() {
        let resp = mint_session(
            &issuer(),
            Some("wss://broker.example/ws"),
            Some("https://app.example"),
        )
        .unwrap();

        let auth = TokenAuthenticator::new(SECRET);
        let avatar = auth.verify(&query(&resp.ws_avatar)["token"]).unwrap();
        let host = auth.verify(&query(&resp.ws_host)["token"]).unwrap();
        assert_eq!(avatar.role, Role::Avatar);
        assert_eq!(host.role, Role::Host);
        assert_eq!(avatar.session, resp.session);
        assert_eq!(host.session, resp.session);
        assert!(resp.ws_avatar.starts_with("wss://broker.example/ws?token="));
    }

    #[test]
    fn pages_embed_session_and_socket_url() {
        let resp = mint_session(
            &issuer(),
            Some("wss://broker.example/ws"),
            Some("https://app.example/base"),
        )
        .unwrap();

        assert!(resp.avatar_page.starts_with("https://app.example/avatar?"));
        assert!(resp.host_panel.starts_with("https://app.example/host?"));
        let avatar = query(&resp.avatar_page);
        assert_eq!(avatar["session"], resp.session.as_str());
        assert_eq!(avatar["wss"], resp.ws_avatar);
        assert_eq!(query(&resp.host_panel)["wss"], resp.ws_host);
    }

    #[test]
    fn each_call_mints_a_new_session() {
        let a = mint_session(&issuer(), Some("ws://h/ws"), Some("http://h")).unwrap();
        let b = mint_session(&issuer(), Some("ws://h/ws"), Some("http://h")).unwrap();
        assert_ne!(a.session, b.session);
    }

    #[test]
    fn missing_urls_are_not_configured() {
        let err = mint_session(&issuer(), None, Some("http://h")).unwrap_err();
        assert_matches!(err, SessionApiError::NotConfigured("WS_PUBLIC_URL"));
        let err = mint_session(&issuer(), Some("ws://h/ws"), None).unwrap_err();
        assert_eq!(err.to_string(), "PUBLIC_APP_URL is not configured");
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unparsable_url_is_an_error() {
        let err = mint_session(&issuer(), Some("not a url"), Some("http://h")).unwrap_err();
        assert_matches!(err, SessionApiError::InvalidUrl(_));
    }
}
