//! Graceful shutdown via `CancellationToken`.
//!
//! One token is shared by the HTTP listener and every socket loop. Once
//! it is cancelled the listener stops accepting, each socket sends a
//! Close frame and unregisters itself, and [`ShutdownCoordinator::drain`]
//! waits for both to finish.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::websocket::registry::ConnectionRegistry;

/// How long [`ShutdownCoordinator::drain`] waits when no timeout is given.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const REGISTRY_POLL: Duration = Duration::from_millis(25);

/// Owns the server-wide cancellation token.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the server-wide token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait for the listener task and for every connection
    /// to leave `registry`.
    ///
    /// Returns `false` if `timeout` (default 10s) ran out first.
    pub async fn drain(
        &self,
        server_task: JoinHandle<()>,
        registry: &ConnectionRegistry,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        info!(
            connections = registry.connection_count().await,
            timeout_secs = timeout.as_secs(),
            "draining"
        );

        let drained = tokio::time::timeout(timeout, async {
            let _ = server_task.await;
            while registry.connection_count().await > 0 {
                tokio::time::sleep(REGISTRY_POLL).await;
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                remaining = registry.connection_count().await,
                "drain timed out after {timeout:?}"
            );
        }
        drained
    }
}
