use anyhow::Result;
use clap::Parser;
use core_logic::{
    log_summary, persist_results, resolve_results_path, setup_logger, BatchRunner, BatchSummary,
};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tron_transfer::{TronClient, TronConfig, TronSigner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent TRC-20 transfer dispatcher", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/tron-transfer/config.toml")]
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
    let _log_guard = setup_logger("tron-transfer", args.verbose);
    dotenv().ok();

    info!("Loading config from: {}", args.config);
    let config = match TronConfig::load(&args.config) {
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

    let client = TronClient::connect(&config.node_url, config.api_key.as_deref(), config.fee_limit)?;
    if let Err(e) = client.latest_block().await {
        error!("{:#}", e);
        return Err(e);
    }

    info!(
        target: "task_result",
        "Dispatching {} TRC-20 transfer(s) in {} round(s) with up to {} in flight",
        batch.total_transfers(),
        batch.loop_count,
        batch.max_concurrency
    );

    let runner = BatchRunner::new(batch, Arc::new(client), Arc::new(TronSigner::new()));

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
