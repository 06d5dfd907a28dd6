use abi_common::valkey;
use abi_common::{BoundContract, DecodedEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

use crate::fetcher::LogBatch;

const RETRY_DELAY: Duration = Duration::from_secs(1);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Decode every log in `batch` that belongs to `contract`, skipping reverted
/// and undecodable ones.
pub fn decode_batch(contract: &BoundContract, batch: &LogBatch, indexed_at_ms: u64) -> Vec<DecodedEvent> {
    let mut events = Vec::new();

    for log in &batch.logs {
        if log.removed {
            continue;
        }
        match contract.decode_log(log) {
            Ok(mut event) => {
                event.indexed_at_ms = indexed_at_ms;
                events.push(event);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to decode log at block {:?} (tx {:?}): {}",
                    log.block_number,
                    log.transaction_hash,
                    e
                );
            }
        }
    }

    events
}

/// One transaction that queues `events` and moves the checkpoint to `to_block`,
/// so a failed push never advances the resume point.
pub fn batch_pipeline(events: &[String], last_block_key: &str, to_block: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for event_json in events {
        pipe.lpush(valkey::EVENT_QUEUE, event_json).ignore();
    }
    pipe.set(last_block_key, to_block).ignore();
    pipe
}

pub async fn process_batches(
    mut batches_rx: mpsc::Receiver<LogBatch>,
    mut con: redis::aio::MultiplexedConnection,
    is_running: Arc<AtomicBool>,
    contract: Arc<BoundContract>,
) {
    let last_block_key = valkey::last_processed_block_key(contract.name());
    let mut batches_processed: u64 = 0;

    while is_running.load(Ordering::SeqCst) {
        let batch = match batches_rx.recv().await {
            Some(batch) => batch,
            None => break,
        };

        let events: Vec<String> = decode_batch(&contract, &batch, now_ms())
            .iter()
            .filter_map(|event| match serde_json::to_string(event) {
                Ok(json) => Some(json),
                Err(e) => {
                    tracing::error!("Failed to serialize decoded event: {}", e);
                    None
                }
            })
            .collect();

        let pipe = batch_pipeline(&events, &last_block_key, batch.to_block);
        loop {
            let pushed: redis::RedisResult<()> = pipe.query_async(&mut con).await;
            match pushed {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!(
                        "Failed to queue blocks {}..={}, retrying: {}",
                        batch.from_block,
                        batch.to_block,
                        e
                    );
                    if !is_running.load(Ordering::SeqCst) {
                        tracing::warn!(
                            "Shutting down before blocks {}..={} were saved",
                            batch.from_block,
                            batch.to_block
                        );
                        return;
                    }
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }

        if !events.is_empty() {
            tracing::info!(
                "Blocks {}..={}: pushed {} events ({} logs)",
                batch.from_block,
                batch.to_block,
                events.len(),
                batch.logs.len()
            );
        }

        batches_processed += 1;
        if batches_processed % 100 == 0 {
            tracing::info!(
                "Processed {} batches (latest block: {})",
                batches_processed,
                batch.to_block
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi_common::literal::coin_interface;
    use abi_common::{bind, Address, Log};

    fn contract() -> BoundContract {
        bind(coin_interface().unwrap(), Address([0x42; 20]))
            .unwrap()
            .with_name("coin")
    }

    fn cash_in(contract: &BoundContract, value: u8, removed: bool) -> Log {
        let mut data = vec![0u8; 32];
        data[31] = value;
        Log {
            address: contract.address(),
            topics: vec![contract.event("CashIn").unwrap().topic().unwrap().to_vec()],
            data,
            block_number: Some(100),
            transaction_hash: Some("0x01".into()),
            log_index: Some(0),
            removed,
        }
    }

    #[test]
    fn decodes_and_stamps_events() {
        let contract = contract();
        let batch = LogBatch {
            from_block: 100,
            to_block: 199,
            logs: vec![cash_in(&contract, 5, false), cash_in(&contract, 6, false)],
        };
        let events = decode_batch(&contract, &batch, 1234);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.indexed_at_ms == 1234));
        assert_eq!(events[1].param("value"), Some(&serde_json::json!("6")));
    }

    #[test]
    fn skips_removed_and_undecodable_logs() {
        let contract = contract();
        let mut garbage = cash_in(&contract, 1, false);
        garbage.topics[0] = vec![0u8; 32];
        let batch = LogBatch {
            from_block: 0,
            to_block: 0,
            logs: vec![cash_in(&contract, 1, true), garbage, cash_in(&contract, 2, false)],
        };
        let events = decode_batch(&contract, &batch, 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "CashIn");
    }

    #[test]
    fn checkpoint_moves_in_the_same_transaction_as_the_events() {
        let events = vec![r#"{"event":"CashIn"}"#.to_string(), r#"{"event":"CashIn"}"#.to_string()];
        let pipe = batch_pipeline(&events, "last_processed_block:coin", 199);
        let packed = String::from_utf8(pipe.get_packed_pipeline()).unwrap();

        let multi = packed.find("MULTI").unwrap();
        let first_push = packed.find("LPUSH").unwrap();
        let last_push = packed.rfind("LPUSH").unwrap();
        let set = packed.find("SET").unwrap();
        let exec = packed.find("EXEC").unwrap();
        assert!(multi < first_push && first_push < last_push);
        assert!(last_push < set && set < exec);
        assert_eq!(packed.matches("LPUSH").count(), 2);
        assert!(packed.contains("last_processed_block:coin"));
    }

    #[test]
    fn empty_batch_still_checkpoints() {
        let pipe = batch_pipeline(&[], "last_processed_block:coin", 5);
        let packed = String::from_utf8(pipe.get_packed_pipeline()).unwrap();
        assert!(!packed.contains("LPUSH"));
        assert!(packed.contains("SET"));
    }
}
