use abi_common::valkey;
use abi_common::DecodedEvent;
use redis::AsyncCommands;
use tokio::sync::broadcast;

/// Two hours in milliseconds (for trimming the WS catch-up sorted set).
const CATCHUP_RETENTION_MS: u64 = 7_200_000;

/// WebSocket message for a decoded event.
pub fn event_message(event: &DecodedEvent) -> serde_json::Value {
    serde_json::json!({
        "type": "event",
        "contract": event.contract,
        "address": event.address,
        "event": event.event,
        "block_number": event.block_number,
        "transaction_hash": event.transaction_hash,
        "log_index": event.log_index,
        "timestamp_ms": event.indexed_at_ms,
        "params": event.params,
    })
}

/// Consume decoded events from the Valkey queue and fan them out to WebSocket clients.
pub async fn run(mut con: redis::aio::MultiplexedConnection, broadcast_tx: broadcast::Sender<String>) {
    tracing::info!("Consumer started");

    loop {
        // RPOPLPUSH: atomically move from event_queue to processing_queue
        let event_json: Option<String> = match redis::cmd("RPOPLPUSH")
            .arg(valkey::EVENT_QUEUE)
            .arg(valkey::PROCESSING_QUEUE)
            .query_async(&mut con)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("RPOPLPUSH failed: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                continue;
            }
        };

        let event_json = match event_json {
            Some(json) => json,
            None => {
                // Queue is empty, wait a bit
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                continue;
            }
        };

        let event: DecodedEvent = match serde_json::from_str(&event_json) {
            Ok(e) => e,
            Err(e) => {
                tracing::error!("Failed to parse decoded event: {}", e);
                // Remove from processing queue even if parse fails
                let _: () = con
                    .lrem(valkey::PROCESSING_QUEUE, 1, &event_json)
                    .await
                    .unwrap_or_default();
                continue;
            }
        };

        let ws_json = event_message(&event).to_string();

        // ZADD + trim + LREM in a single pipeline
        let cutoff = event.indexed_at_ms.saturating_sub(CATCHUP_RETENTION_MS);
        let stored: redis::RedisResult<()> = redis::pipe()
            .zadd(valkey::EVENTS_ZSET, &ws_json, event.indexed_at_ms as f64).ignore()
            .zrembyscore(valkey::EVENTS_ZSET, 0u64, cutoff).ignore()
            .lrem(valkey::PROCESSING_QUEUE, 1, &event_json).ignore()
            .query_async(&mut con)
            .await;
        if let Err(e) = stored {
            // The event stays in the processing queue; it is still broadcast.
            tracing::error!("Failed to store {}.{} for catch-up: {}", event.contract, event.event, e);
        }

        tracing::debug!(
            "{}.{} at block {:?}",
            event.contract,
            event.event,
            event.block_number
        );

        // Broadcast to WebSocket subscribers
        let _ = broadcast_tx.send(ws_json);
    }
}
