use abi_common::{BoundContract, Log};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::rpc::RpcClient;

/// Logs of one block range, in node order.
#[derive(Debug)]
pub struct LogBatch {
    pub from_block: u64,
    pub to_block: u64,
    pub logs: Vec<Log>,
}

pub struct FetcherConfig {
    pub start_block: u64,
    pub batch_blocks: u64,
    pub poll_interval: Duration,
}

/// Inclusive block range to fetch next, or None when caught up with `head`.
pub fn next_range(from: u64, head: u64, batch_blocks: u64) -> Option<(u64, u64)> {
    if from > head {
        return None;
    }
    let to = from.saturating_add(batch_blocks - 1).min(head);
    Some((from, to))
}

/// Poll the node for the contract's logs and send them to the processor
/// until `is_running` clears or the receiver is dropped.
pub async fn start_fetcher(
    rpc: RpcClient,
    contract: Arc<BoundContract>,
    config: FetcherConfig,
    blocks_tx: mpsc::Sender<LogBatch>,
    is_running: Arc<AtomicBool>,
) {
    let mut next_block = config.start_block;

    while is_running.load(Ordering::SeqCst) {
        let head = match rpc.block_number().await {
            Ok(head) => head,
            Err(e) => {
                tracing::error!("eth_blockNumber failed: {}", e);
                tokio::time::sleep(config.poll_interval).await;
                continue;
            }
        };

        let Some((from, to)) = next_range(next_block, head, config.batch_blocks) else {
            // Caught up, wait for new blocks
            tokio::time::sleep(config.poll_interval).await;
            continue;
        };

        let filter = contract.event_filter(from, Some(to));
        let logs = match rpc.get_logs(filter).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::error!("eth_getLogs for blocks {}..={} failed: {}", from, to, e);
                tokio::time::sleep(config.poll_interval).await;
                continue;
            }
        };

        tracing::debug!("Fetched {} logs for blocks {}..={}", logs.len(), from, to);

        let batch = LogBatch {
            from_block: from,
            to_block: to,
            logs,
        };
        if blocks_tx.send(batch).await.is_err() {
            break;
        }
        next_block = to + 1;
    }

    tracing::info!("Fetcher stopped at block {}", next_block);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_capped_by_batch_and_head() {
        assert_eq!(next_range(0, 5000, 1000), Some((0, 999)));
        assert_eq!(next_range(4500, 5000, 1000), Some((4500, 5000)));
        assert_eq!(next_range(7, 7, 1), Some((7, 7)));
        assert_eq!(next_range(5001, 5000, 1000), None);
    }
}
