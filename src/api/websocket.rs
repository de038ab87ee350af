//! WebSocket handler for real-time alert streaming

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::state::ApiState;

/// WebSocket upgrade handler
///
/// GET /api/v1/alerts/stream
pub async fn alert_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

/// Forward every persisted alert to the client as a JSON text frame
async fn handle_websocket(socket: WebSocket, state: ApiState) {
    info!("alert stream client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut alert_rx = state.engine.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            match alert_rx.recv().await {
                Ok(event) => {
                    let json = serde_json::json!({
                        "type": "alert",
                        "alert": event,
                    });

                    if let Ok(text) = serde_json::to_string(&json)
                        && sender.send(Message::Text(text)).await.is_err()
                    {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("alert stream client lagging, skipped {} alerts", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("alert channel closed");
                    break;
                }
            }
        }
    });

    // The client never sends anything meaningful; only watch for close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("alert stream client disconnected");
}
