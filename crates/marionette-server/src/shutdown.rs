//! Shutdown signal shared by the listener and every WebSocket session.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long `main` waits for the listener to drain.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Root cancellation token of a server.
///
/// The listener watches the root token. Each session gets a child token, so
/// cancelling the coordinator closes every open socket while a session
/// ending on its own leaves the others alone.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token cancelled with this coordinator but cancellable on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Cancel the root token.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for the serve task to finish.
    ///
    /// Returns `false` if the task was still running when the wait gave up.
    pub async fn shutdown_and_wait(&self, server: JoinHandle<()>, timeout: Duration) -> bool {
        self.shutdown();
        info!(timeout_ms = timeout.as_millis(), "waiting for server to drain");
        match tokio::time::timeout(timeout, server).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "server task failed during shutdown");
                true
            }
            Err(_) => {
                warn!("shutdown timed out after {timeout:?}");
                false
            }
        }
    }
}
