//! `MarionetteServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use marionette_auth::{TokenAuthenticator, TokenIssuer};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::SESSIONS_MINTED_TOTAL;
use crate::session_api::{self, SessionApiError, SessionResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::gate;
use crate::websocket::session::{SessionOptions, reject, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Command/ack broker.
    pub broker: Broker,
    /// Verifies upgrade tokens.
    pub authenticator: Arc<TokenAuthenticator>,
    /// Signs tokens for `POST /session`.
    pub issuer: Arc<TokenIssuer>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus metrics handle for `/metrics`.
    pub metrics_handle: PrometheusHandle,
}

/// The Marionette server.
pub struct MarionetteServer {
    state: AppState,
}

impl MarionetteServer {
    /// Create a new server.
    ///
    /// Issuer and authenticator must share a secret for minted tokens to be
    /// accepted at upgrade.
    pub fn new(
        config: ServerConfig,
        broker: Broker,
        issuer: TokenIssuer,
        authenticator: TokenAuthenticator,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            state: AppState {
                broker,
                authenticator: Arc::new(authenticator),
                issuer: Arc::new(issuer),
                config: Arc::new(config),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
                metrics_handle,
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.state.config.ws_path, get(ws_handler))
            .route("/session", post(session_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "server stopped with error");
            }
        });

        info!(
            %local_addr,
            ws_path = %self.state.config.ws_path,
            "marionette server listening"
        );
        Ok((local_addr, handle))
    }

    /// Get the broker.
    pub fn broker(&self) -> &Broker {
        &self.state.broker
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// GET `<ws_path>?token=...`
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    let ws = ws.max_message_size(state.config.max_message_size);

    match gate::admit(
        &state.config,
        &state.authenticator,
        origin,
        params.token.as_deref(),
    ) {
        Ok(claims) => {
            let options = SessionOptions {
                heartbeat_interval: state.config.heartbeat_interval(),
                send_buffer: state.config.send_buffer,
            };
            let cancel = state.shutdown.child_token();
            let broker = state.broker.clone();
            ws.on_upgrade(move |socket| {
                run_ws_session(socket, claims.role, claims.session, broker, options, cancel)
            })
        }
        Err(rejection) => ws.on_upgrade(move |socket| reject(socket, rejection)),
    }
}

/// POST /session
async fn session_handler(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, SessionApiError> {
    let resp = session_api::mint_session(
        &state.issuer,
        state.config.ws_public_url.as_deref(),
        state.config.public_app_url.as_deref(),
    )?;
    counter!(SESSIONS_MINTED_TOTAL).increment(1);
    info!(session = %resp.session, "session minted");
    Ok(Json(resp))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.broker.stats()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::render(&state.metrics_handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::broker::BrokerConfig;

    const SECRET: &[u8] = b"server-secret";

    fn make_server(config: ServerConfig) -> MarionetteServer {
        MarionetteServer::new(
            config,
            Broker::new(BrokerConfig::default()),
            TokenIssuer::new(SECRET, Duration::from_secs(60)),
            TokenAuthenticator::new(SECRET),
            crate::metrics::detached_handle(),
        )
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_tables() {
        let app = make_server(ServerConfig::default()).router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert_eq!(parsed["rooms"], 0);
        assert_eq!(parsed["pending"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text() {
        let app = make_server(ServerConfig::default()).router();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn session_endpoint_mints_urls() {
        let app = make_server(ServerConfig {
            ws_public_url: Some("ws://localhost:3000/ws".into()),
            public_app_url: Some("http://localhost:3000".into()),
            ..ServerConfig::default()
        })
        .router();
        let req = Request::builder()
            .method("POST")
            .uri("/session")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = body_json(resp).await;
        let session = parsed["session"].as_str().unwrap();
        assert!(!session.is_empty());
        assert!(
            parsed["ws_host"]
                .as_str()
                .unwrap()
                .starts_with("ws://localhost:3000/ws?token=")
        );
        assert!(parsed["avatar_page"].as_str().unwrap().contains(session));
        assert!(parsed["host_panel"].is_string());
    }

    #[tokio::test]
    async fn session_endpoint_unconfigured_is_503() {
        let app = make_server(ServerConfig::default()).router();
        let req = Request::builder()
            .method("POST")
            .uri("/session")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["error"], "WS_PUBLIC_URL is not configured");
    }

    #[tokio::test]
    async fn plain_get_on_ws_path_is_not_an_upgrade() {
        let app = make_server(ServerConfig::default()).router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn custom_ws_path_is_routed() {
        let app = make_server(ServerConfig {
            ws_path: "/live".into(),
            ..ServerConfig::default()
        })
        .router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = Request::builder().uri("/live").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shutdown_propagates_to_coordinator() {
        let server = make_server(ServerConfig::default());
        assert!(!server.shutdown().is_shutting_down());
        server.shutdown().shutdown();
        assert!(server.shutdown().is_shutting_down());
        assert_eq!(server.config().port, 0);
        assert_eq!(server.broker().pending_count(), 0);
    }
}
