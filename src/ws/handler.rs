//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::snapshot::{clamp_target, mirror_point, view_for};
use crate::util::rate_limit::ClientRateLimiter;
use crate::ws::protocol::{PaddleTarget, Role, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client_id, role) = state.clients.connect();
    let table = state.session.table();

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Handshake: table geometry and assigned role, before any state flows
    let init = ServerMsg::Init {
        table,
        clienttype: role,
        message: Some("Initial table".to_string()),
    };
    if let Err(e) = send_msg(&mut ws_sink, &init).await {
        error!(client_id, error = %e, "failed to send init handshake");
        state.clients.disconnect(client_id);
        return;
    }
    state.clients.set_ready(client_id);

    // Writer task: snapshot broadcast -> perspective view -> WebSocket
    let mut snapshot_rx = state.session.subscribe();
    let clients = state.clients.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(snapshot) => {
                    if !clients.is_ready(client_id) {
                        continue;
                    }
                    let msg = ServerMsg::State {
                        state: view_for(role, &table, &snapshot),
                        message: None,
                    };
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(client_id, tick = snapshot.tick, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Keep the connection; it just misses some ticks
                    warn!(client_id, lagged = n, "client lagged, skipping snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(client_id, "snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: raw {x, y} paddle targets -> session
    let rate_limiter = ClientRateLimiter::new();
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(client_id, "rate limited input message");
                    continue;
                }
                if !role.is_player() {
                    continue;
                }

                match serde_json::from_str::<PaddleTarget>(&text) {
                    Ok(target) => {
                        // The server owns player 2's mirror; clamping keeps
                        // each paddle on its own half of the table
                        let (x, y) = if role == Role::Player2 {
                            mirror_point(&table, target.x, target.y)
                        } else {
                            (target.x, target.y)
                        };
                        let (x, y) = clamp_target(role, &table, x, y);

                        if state.session.set_paddle_target(role, x, y).await.is_err() {
                            debug!(client_id, "session gone, closing connection");
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(client_id, error = %e, "discarding malformed paddle message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(client_id, "received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(client_id, "client initiated close");
                break;
            }
            Err(e) => {
                debug!(client_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Free the slot first so broadcasts stop targeting it, then stop the
    // writer; the session loop and the other connections never notice
    state.clients.disconnect(client_id);
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
