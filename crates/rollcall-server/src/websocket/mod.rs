//! WebSocket connection state, fan-out, and the per-client socket loop.

pub mod connection;
pub mod registry;
pub mod session;

pub use connection::ClientConnection;
pub use registry::ConnectionRegistry;
