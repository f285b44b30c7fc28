use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use wallet_ledger::{bin_utils::Service, config::WalletConfig, processor::OperationProcessError};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let filename = std::env::args()
        .nth(1)
        .context("Expected a file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let config_path = std::env::var_os("WALLET_CONFIG").map(PathBuf::from);
    let config = WalletConfig::load(config_path.as_deref()).context("Failed to load config")?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line, err| match err {
            OperationProcessError::CommandErr(err) => eprintln!("Error at line {line}: {err}"),
            // rejected operations are business outcomes, not malformed input
            OperationProcessError::WalletErr(err) => warn!(line, %err, "operation rejected"),
        }),
    };
    service.run()
}
