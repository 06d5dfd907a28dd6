use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use redis::AsyncCommands;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use crate::api::AppState;

/// Serve one client: live decoded events plus catch-up replies, both funnelled
/// through a single outbound queue.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(256);

    let mut live = tokio::spawn(forward_broadcast(
        state.broadcast_tx.subscribe(),
        outbound_tx.clone(),
    ));

    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let valkey = state.valkey.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            if let Message::Text(text) = msg {
                handle_client_message(text.as_str(), valkey.as_ref(), &outbound_tx).await;
            }
        }
    });

    // Whichever side finishes first ends the session.
    tokio::select! {
        _ = &mut live => {},
        _ = &mut writer => {},
        _ = &mut reader => {},
    }
    live.abort();
    writer.abort();
    reader.abort();
}

/// Copy live events into a client's outbound queue. A client that falls
/// behind skips the events it missed and keeps receiving new ones.
pub async fn forward_broadcast(mut events: broadcast::Receiver<String>, outbound: mpsc::Sender<String>) {
    loop {
        match events.recv().await {
            Ok(text) => {
                if outbound.send(text).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("WebSocket client lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Timestamp a catch-up request asks for, if the message is one.
pub fn catch_up_since(text: &str) -> Option<u64> {
    let msg: serde_json::Value = serde_json::from_str(text).ok()?;
    if msg.get("type").and_then(|t| t.as_str()) != Some("catch_up") {
        return None;
    }
    msg.get("since_timestamp")
        .and_then(|t| t.as_f64())
        .map(|since| since as u64)
}

async fn handle_client_message(
    text: &str,
    valkey: Option<&redis::aio::MultiplexedConnection>,
    sender: &mpsc::Sender<String>,
) {
    let Some(since_ts) = catch_up_since(text) else {
        return;
    };
    let Some(valkey) = valkey else {
        return;
    };

    let events: Vec<String> = match valkey
        .clone()
        .zrangebyscore(abi_common::valkey::EVENTS_ZSET, since_ts, "+inf")
        .await
    {
        Ok(events) => events,
        Err(e) => {
            tracing::error!("WebSocket catch-up since {} failed: {}", since_ts, e);
            return;
        }
    };

    tracing::info!(
        "WebSocket catch-up: {} events since {}",
        events.len(),
        since_ts
    );

    for event_json in events {
        if sender.send(event_json).await.is_err() {
            break;
        }
    }
}
