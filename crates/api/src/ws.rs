//! WebSocket endpoint for real-time notification delivery.
//!
//! The client connects with an already-issued JWT (`/ws?token=..`); the
//! identity is verified before the upgrade, then the connection is
//! registered with the fanout layer under that user. Wire messages from
//! the backplane are forwarded to the socket by a spawned sender task.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_fanout::WireMessage;

use crate::middleware::auth::verify_token;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// GET /ws — Upgrade to WebSocket after verifying the token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let auth = verify_token(&query.token, &state.config.jwt_secret)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, auth.user_id)))
}

/// Manage a single connection after upgrade.
///
/// Registers with the fanout registry, confirms registration to the
/// client, then forwards registry messages to the sink until either side
/// disconnects.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let conn_id = Uuid::new_v4();
    let registry = state.fanout.registry();
    let mut rx = registry.add(conn_id, user_id).await;
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // Confirm registration.
    if let Ok(greeting) = serde_json::to_string(&WireMessage::connection_successful())
        && sink.send(Message::Text(greeting.into())).await.is_err()
    {
        registry.remove(conn_id).await;
        return;
    }

    // Sender task: forward fanout messages to the socket sink.
    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        // Registry dropped the channel (shutdown) or the sink closed.
        let _ = sink.send(Message::Close(None)).await;
    });

    // Receiver loop: the client only listens on this channel; inbound
    // traffic is limited to protocol frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    registry.remove(conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket disconnected");
}
