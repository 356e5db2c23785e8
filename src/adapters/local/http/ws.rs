use crate::adapters::local::events::SessionRegistry;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// WebSocket endpoint; the newest connection becomes the session that receives job events.
pub async fn handle(
    ws: WebSocketUpgrade,
    State(sessions): State<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_session(socket, sessions))
}

async fn serve_session(socket: WebSocket, sessions: Arc<SessionRegistry>) {
    let (id, mut events) = sessions.register();
    let (mut sender, mut receiver) = socket.split();

    // Ends when the session is replaced (channel closed) or the socket stops accepting writes.
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        if let Message::Close(_) = message {
            break;
        }
    }

    debug!(session = %id, "client disconnected");
    send_task.abort();
    sessions.clear(id);
}
