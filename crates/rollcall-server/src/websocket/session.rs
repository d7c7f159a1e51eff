//! WebSocket session lifecycle: handshake through disconnect for one
//! client.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use rollcall_core::protocol::{CONNECTED_EVENT, ConnectedPayload};
use rollcall_core::{ConnectionId, CoordinatorError, Identity, OutboundEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::server::AppState;

/// Authenticate a freshly upgraded socket, then run it until it closes.
///
/// A bad token gets one `ERROR` frame followed by a Close frame; the
/// connection is never registered.
pub async fn handle_socket(mut socket: WebSocket, token: Option<String>, state: AppState) {
    let identity = match state
        .auth
        .authenticate(token.as_deref(), state.directory.as_ref())
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "handshake rejected");
            let err = CoordinatorError::from(e);
            if let Ok(json) = err.to_event().to_json() {
                let _ = socket.send(Message::Text(json.into())).await;
            }
            if err.closes_connection() {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::POLICY,
                        reason: err.to_string().into(),
                    })))
                    .await;
            }
            return;
        }
    };

    run_ws_session(socket, ConnectionId::new(), identity, state).await;
}

/// Run a WebSocket session for an authenticated client.
///
/// 1. Registers the connection and sends `CONNECTED`
/// 2. Forwards queued outbound frames and sends periodic Pings
/// 3. Routes incoming text frames through the event router
/// 4. Unregisters on disconnect, heartbeat timeout or server shutdown
#[instrument(skip_all, fields(conn_id = %conn_id, user_id = %identity.id, role = %identity.role))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    identity: Identity,
    state: AppState,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), identity.clone(), send_tx));

    let connected = OutboundEvent::new(
        CONNECTED_EVENT,
        &ConnectedPayload {
            connection_id: conn_id.clone(),
            user_id: identity.id.clone(),
            role: identity.role,
        },
    );
    if let Ok(json) = connected.to_json() {
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    state.registry.register(Arc::clone(&connection)).await;
    info!("client connected");

    // Cancelled by server shutdown or by the writer on heartbeat timeout.
    let closing = state.shutdown.token().child_token();
    let outbound = tokio::spawn(write_loop(
        ws_tx,
        send_rx,
        Arc::clone(&connection),
        Heartbeat {
            interval: state.config.heartbeat_interval(),
            timeout: state.config.heartbeat_timeout(),
        },
        closing.clone(),
    ));

    loop {
        let msg = tokio::select! {
            () = closing.cancelled() => {
                debug!("closing connection");
                break;
            }
            msg = ws_rx.next() => msg,
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    Some(s.to_string())
                } else {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    reply(&connection, &CoordinatorError::MalformedMessage.to_event());
                    None
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.touch();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.touch();

        if let Some(response) = state.router.route(&identity, &text).await {
            reply(&connection, &response);
        }
    }

    closing.cancel();
    state.registry.unregister(&conn_id).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), outbound).await;
    info!(
        dropped = connection.dropped(),
        uptime_secs = connection.uptime().as_secs(),
        "client disconnected"
    );
}

fn reply(connection: &ClientConnection, event: &OutboundEvent) {
    let Ok(json) = event.to_json() else { return };
    if !connection.enqueue(Arc::new(json)) {
        info!(conn_id = %connection.id, "failed to enqueue response (channel full or closed)");
    }
}

struct Heartbeat {
    interval: Duration,
    timeout: Duration,
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Arc<String>>,
    connection: Arc<ClientConnection>,
    heartbeat: Heartbeat,
    closing: CancellationToken,
) {
    let mut ping_interval = tokio::time::interval(heartbeat.interval);
    // Skip the immediate first tick
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            () = closing.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if connection.is_stale(heartbeat.timeout) {
                    warn!(conn_id = %connection.id, "client unresponsive for {:?}, disconnecting", heartbeat.timeout);
                    closing.cancel();
                    continue;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    closing.cancel();
}
