//! WebSocket delivery of fan-out events.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};

use crate::fanout::{SNAPSHOT_EVENT, StreamEvent};
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub(super) async fn stream_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_stream(socket, state))
}

fn encode(event: &StreamEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = ?e, "Failed to encode stream event");
            None
        }
    }
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before reading the snapshot so nothing published in between is lost.
    let mut events = state.hub.subscribe();
    debug!(subscribers = state.hub.subscriber_count(), "Stream client connected");

    let snapshot = StreamEvent::new(SNAPSHOT_EVENT, state.recent.snapshot().await);
    if let Some(message) = encode(&snapshot)
        && sender.send(message).await.is_err()
    {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(message) = encode(&event)
                            && sender.send(message).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Stream client lagged, skipping events");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    trace!("Stream client disconnected");
}
