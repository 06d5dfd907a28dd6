use abi_common::Address;

pub struct Config {
    pub rpc_url: String,
    pub valkey_url: String,
    pub contract_address: Address,
    pub contract_name: String,
    /// Interface JSON to bind; the bundled wallet interface when unset.
    pub abi_path: Option<String>,
    pub poll_interval_ms: u64,
    pub batch_blocks: u64,
    /// First block to scan when nothing has been processed yet.
    pub start_block: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let contract_address: Address = var("CONTRACT_ADDRESS")
            .ok_or_else(|| anyhow::anyhow!("CONTRACT_ADDRESS must be set"))?
            .parse()?;

        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match var(key) {
                Some(v) => v
                    .parse()
                    .map_err(|e| anyhow::anyhow!("{key}={v} is not a number: {e}")),
                None => Ok(default),
            }
        };

        let batch_blocks = number("BATCH_BLOCKS", 1000)?;
        if batch_blocks == 0 {
            anyhow::bail!("BATCH_BLOCKS must be at least 1");
        }

        Ok(Self {
            rpc_url: var("RPC_URL").unwrap_or_else(|| "http://127.0.0.1:8545".into()),
            valkey_url: var("VALKEY_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            contract_address,
            contract_name: var("CONTRACT_NAME")
                .unwrap_or_else(|| abi_common::literal::COIN_CONTRACT_NAME.into()),
            abi_path: var("ABI_PATH"),
            poll_interval_ms: number("POLL_INTERVAL_MS", 2000)?,
            batch_blocks,
            start_block: number("START_BLOCK", 0)?,
        })
    }
}
