use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::broadcast::channel_name;
use crate::protocol::ChannelMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub room_id: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(room_id = %params.room_id, "WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, params.room_id, state))
}

/// Forward every event of `room_id` to the socket until either side hangs up.
/// Sockets are receive-only; actions go through the HTTP API.
async fn handle_socket(socket: WebSocket, room_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.broadcaster.subscribe(&room_id).await;
    let channel = channel_name(&room_id);

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(room_id = %room_id, skipped, "WebSocket fell behind, skipping events");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!(room_id = %room_id, "Room channel closed");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                };

                let message = ChannelMessage { channel: channel.clone(), event: &event };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to serialize room event: {}", e),
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    drop(events);
    if state.broadcaster.prune(&room_id).await {
        tracing::debug!(room_id = %room_id, "Dropped idle room channel");
    }
    tracing::info!(room_id = %room_id, "WebSocket connection closed");
}
