//! `RollcallServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use rollcall_core::DirectoryStore;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::attendance::{EventRouter, SessionState};
use crate::auth::TokenAuthority;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::handle_socket;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live connections.
    pub registry: Arc<ConnectionRegistry>,
    /// The at-most-one attendance session.
    pub sessions: Arc<SessionState>,
    /// Inbound event dispatch.
    pub router: Arc<EventRouter>,
    /// Accounts, rosters and records.
    pub directory: Arc<dyn DirectoryStore>,
    /// Handshake token verification.
    pub auth: Arc<TokenAuthority>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The rollcall server.
pub struct RollcallServer {
    state: AppState,
}

impl RollcallServer {
    /// Create a server over a directory and token authority.
    pub fn new(
        config: ServerConfig,
        directory: Arc<dyn DirectoryStore>,
        auth: TokenAuthority,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let sessions = Arc::new(SessionState::new());
        let router = Arc::new(EventRouter::new(
            Arc::clone(&directory),
            Arc::clone(&registry),
            Arc::clone(&sessions),
        ));
        Self {
            state: AppState {
                config: Arc::new(config),
                registry,
                sessions,
                router,
                directory,
                auth: Arc::new(auth),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the server
    /// task, which finishes once [`ShutdownCoordinator::shutdown`] is
    /// called and in-flight HTTP requests drain.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.state.shutdown.token();

        info!(%addr, "rollcall server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
            info!("server stopped");
        });
        Ok((addr, handle))
    }

    /// Shut down and wait for `server_task` and every socket to finish.
    ///
    /// An open attendance session is not persisted; its marks are lost.
    pub async fn stop(&self, server_task: JoinHandle<()>, timeout: Option<Duration>) -> bool {
        if let Some(class_id) = self.state.sessions.active_class().await {
            warn!(%class_id, "stopping with an unfinished session, its marks are discarded");
        }
        self.state
            .shutdown
            .drain(server_task, &self.state.registry, timeout)
            .await
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// Get the session state.
    pub fn sessions(&self) -> &Arc<SessionState> {
        &self.state.sessions
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Get the token authority.
    pub fn auth(&self) -> &Arc<TokenAuthority> {
        &self.state.auth
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.connection_count().await;
    let active_class = state.sessions.active_class().await;
    Json(health::health_check(state.start_time, connections, active_class))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// GET /ws?token=<jwt>
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, params.token, state))
}
