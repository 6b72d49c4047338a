use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::event_bus::EventEnvelope;
use crate::handlers::AppState;

type Sink = SplitSink<WebSocket, Message>;

/// `GET /api/ws`: a one-way stream of analysis events. Each client first
/// gets a snapshot of provider health, then every envelope published after
/// it subscribed.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(socket: WebSocket, state: AppState) {
    let (mut sink, mut inbound) = socket.split();
    // Subscribe before reading the registry so no health change falls between.
    let mut events = state.event_bus.subscribe();
    tracing::debug!("event stream client connected");

    let snapshot = EventEnvelope::new(state.orchestrator.health_snapshot().await);
    if !forward(&mut sink, &snapshot).await {
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(envelope) => {
                    if !forward(&mut sink, &envelope).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream client lagged behind");
                }
                Err(RecvError::Closed) => break,
            },
            frame = inbound.next() => match frame {
                Some(Ok(Message::Ping(data))) => {
                    if sink.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("event stream client disconnected");
}

/// False once the client is gone.
async fn forward(sink: &mut Sink, envelope: &EventEnvelope) -> bool {
    match serde_json::to_string(envelope) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "event envelope could not be serialized");
            true
        }
    }
}
