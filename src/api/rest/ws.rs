use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info, warn};

use crate::backend::ChangeEvent;
use crate::models::dashboard::DashboardStats;
use crate::models::typing::TypingSignal;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound {
    Change(ChangeEvent),
    Stats(DashboardStats),
    Typing(TypingSignal),
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let changes = tokio_stream::StreamExt::filter_map(
        BroadcastStream::new(state.backend.changes()),
        |event| event.ok().map(Outbound::Change),
    );
    let stats = tokio_stream::StreamExt::filter_map(
        WatchStream::new(state.dashboard.watch()),
        |stats| stats.map(Outbound::Stats),
    );
    let typing = tokio_stream::StreamExt::filter_map(
        BroadcastStream::new(state.typing_tx.subscribe()),
        |signal| signal.ok().map(Outbound::Typing),
    );
    let mut outbound = Box::pin(tokio_stream::StreamExt::merge(
        tokio_stream::StreamExt::merge(changes, stats),
        typing,
    ));

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound.next().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize realtime message for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let typing_tx = state.typing_tx.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };

            match serde_json::from_str::<TypingSignal>(&text) {
                Ok(signal) => {
                    let _ = typing_tx.send(signal);
                }
                Err(err) => debug!(error = %err, "ignoring malformed ws message"),
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
