//! Interactive front end for the proof-of-work ledger

mod command;
mod session;

use crate::session::{forward_interrupts, Session};
use anyhow::Context;
use clap::Parser;
use ledger_chain::BlockChain;
use ledger_consensus::MiningConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger", version, about = "Interactive proof-of-work ledger")]
struct Args {
    /// Mining configuration file (TOML)
    #[arg(short, long, env = "LEDGER_CONFIG")]
    config: Option<PathBuf>,
    /// Required number of leading zero bytes in every block hash
    #[arg(short, long)]
    difficulty: Option<usize>,
    /// Give up mining a block after this many seconds
    #[arg(short, long)]
    timeout_secs: Option<u64>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied
    fn mining_config(&self) -> anyhow::Result<MiningConfig> {
        let mut config = match &self.config {
            Some(path) => MiningConfig::load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => MiningConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config = config.with_difficulty(difficulty);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let config = args.mining_config()?;
    info!("Mining with {}", config.validator());
    let chain = BlockChain::from_config(config).context("Failed to create chain")?;

    let mut session = Session::new(
        chain,
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
        forward_interrupts(),
    );
    session.run().await
}
