use anyhow::Result;
use clap::Parser;
use core_logic::{
    log_summary, persist_results, resolve_results_path, setup_logger, BatchRunner, BatchSummary,
};
use dotenv::dotenv;
use evm_transfer::{EvmClient, EvmConfig, EvmSigner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent ERC-20 transfer dispatcher", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/evm-transfer/config.toml")]
    config: String,
    /// Overrides both `results_path` and RESULTS_PATH.
    #[arg(short, long)]
    results: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logger("evm-transfer", args.verbose);
    dotenv().ok();

    info!("Loading config from: {}", args.config);
    let config = match EvmConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    let batch = match config.batch_config() {
        Ok(b) => b,
        Err(e) => {
            error!("Invalid config: {}", e);
            return Err(e.into());
        }
    };

    let client = EvmClient::connect(&config.rpc_url, config.chain_id, config.gas_limit)?;
    if let Err(e) = client.verify_chain_id().await {
        error!("{:#}", e);
        return Err(e);
    }

    info!(
        target: "task_result",
        "Dispatching {} transfer(s) on chain {} with up to {} in flight",
        batch.total_transfers(),
        client.chain_id(),
        batch.max_concurrency
    );

    let signer = Arc::new(EvmSigner::new(config.chain_id));
    let runner = BatchRunner::new(batch, Arc::new(client), signer);

    let started = Instant::now();
    let results = runner.run().await;
    let summary = BatchSummary::from_results(&results, started.elapsed());
    log_summary(&summary, &results);

    let path = args
        .results
        .unwrap_or_else(|| resolve_results_path(&runner.config().results_path));
    match persist_results(&path, &results) {
        Ok(()) => info!(target: "task_result", "Results written to {}", path.display()),
        Err(e) => error!("{}", e),
    }

    Ok(())
}
