//! # rollcall-server
//!
//! Axum HTTP + `WebSocket` server for live attendance sessions.
//!
//! - `WebSocket` gateway: token handshake, heartbeat, per-connection send queues
//! - Connection registry with predicate fan-out
//! - One shared attendance session behind a single lock
//! - Event router and finalizer
//! - `/health` and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod attendance;
pub mod auth;
pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use attendance::{EventRouter, SessionState};
pub use auth::{AuthError, TokenAuthority};
pub use config::ServerConfig;
pub use server::{AppState, RollcallServer};
pub use shutdown::ShutdownCoordinator;
pub use websocket::ConnectionRegistry;
