/// Valkey key for the decoded event queue (indexer LPUSH, server RPOPLPUSH).
pub const EVENT_QUEUE: &str = "event_queue";

/// Valkey key for the processing queue (RPOPLPUSH target).
pub const PROCESSING_QUEUE: &str = "processing_queue";

/// Valkey key for the last block whose logs were fully processed.
pub const LAST_PROCESSED_BLOCK: &str = "last_processed_block";

/// Valkey set of registered contract names.
pub const CONTRACTS: &str = "contracts";

/// Valkey sorted set for recent decoded events (for WebSocket catch-up).
pub const EVENTS_ZSET: &str = "decoded_events";

/// Build the Valkey key for a registered contract hash (`address`, `abi`).
pub fn contract_key(name: &str) -> String {
    format!("contract:{name}")
}

/// Build the Valkey key for the last processed block of one indexed contract.
pub fn last_processed_block_key(contract: &str) -> String {
    format!("{LAST_PROCESSED_BLOCK}:{contract}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(contract_key("coin"), "contract:coin");
        assert_eq!(last_processed_block_key("coin"), "last_processed_block:coin");
    }
}
