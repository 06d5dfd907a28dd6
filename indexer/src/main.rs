mod config;
mod fetcher;
mod processor;
mod rpc;

use abi_common::{bind, ContractInterface};
use redis::AsyncCommands;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use fetcher::{start_fetcher, FetcherConfig};
use rpc::RpcClient;

fn load_interface(abi_path: Option<&str>) -> anyhow::Result<ContractInterface> {
    match abi_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(ContractInterface::from_json(&json)?)
        }
        None => Ok(abi_common::literal::coin_interface()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("abi_indexer=info".parse()?)
                .add_directive("abi_common=info".parse()?),
        )
        .init();

    let config = config::Config::from_env()?;

    let interface = load_interface(config.abi_path.as_deref())?;
    let contract = Arc::new(bind(interface, config.contract_address)?.with_name(&config.contract_name));

    let client = redis::Client::open(config.valkey_url.as_str())?;
    let mut con = client.get_multiplexed_async_connection().await?;

    // Read last processed block
    let last_block: Option<u64> = con
        .get(abi_common::valkey::last_processed_block_key(contract.name()))
        .await?;
    let start_block = last_block.map(|h| h + 1).unwrap_or(config.start_block);

    tracing::info!(
        "Starting indexer from block {} for contract {} at {}",
        start_block,
        contract.name(),
        contract.address()
    );

    let is_running = Arc::new(AtomicBool::new(true));
    signal_hook::flag::register_conditional_default(signal_hook::consts::SIGINT, is_running.clone())?;
    signal_hook::flag::register_conditional_default(signal_hook::consts::SIGTERM, is_running.clone())?;

    let (batches_tx, batches_rx) = mpsc::channel(100);

    let fetcher_config = FetcherConfig {
        start_block,
        batch_blocks: config.batch_blocks,
        poll_interval: Duration::from_millis(config.poll_interval_ms),
    };

    let rpc = RpcClient::new(config.rpc_url);
    let fetcher_contract = contract.clone();
    let fetcher_running = is_running.clone();
    let fetcher_handle = tokio::spawn(async move {
        start_fetcher(rpc, fetcher_contract, fetcher_config, batches_tx, fetcher_running).await;
    });

    processor::process_batches(batches_rx, con, is_running.clone(), contract).await;

    fetcher_handle.abort();

    tracing::info!("Indexer stopped.");
    Ok(())
}
