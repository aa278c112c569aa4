use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use common::ProgressEvent;

use crate::{auth::token_matches, AppState};

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/progress", get(ws_progress_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Streams pipeline progress events as JSON text frames.
/// Auth via query param `?token=<DASHBOARD_TOKEN>` (header auth not supported
/// in browser WebSocket API).
async fn ws_progress_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    if !token_matches(q.token.as_deref(), &state.dashboard_token) {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let (history, live) = state.observer.subscribe_with_history();
    ws.on_upgrade(move |socket| handle_ws(socket, history, live))
}

async fn handle_ws(
    mut socket: WebSocket,
    history: Vec<ProgressEvent>,
    mut live: broadcast::Receiver<ProgressEvent>,
) {
    for event in &history {
        if !send_event(&mut socket, event).await {
            return;
        }
    }

    loop {
        match live.recv().await {
            Ok(event) => {
                if !send_event(&mut socket, &event).await {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket progress client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// False once the client has gone away.
async fn send_event(socket: &mut WebSocket, event: &ProgressEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize progress event");
            true
        }
    }
}
