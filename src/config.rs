//! Wallet settings, read from an optional TOML file and `WALLET_*` environment variables.
//!
//! ```toml
//! history_page_size = 50
//!
//! [fares]
//! min_fare = 5
//! max_fare = 30
//! step = 5
//! discount_percent = 10
//!
//! [gate]
//! secret_length = 4
//! max_failures = 3
//! ```
//!
//! Nested keys are overridden with a double underscore, e.g. `WALLET_GATE__MAX_FAILURES=5`.
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{fare::FareSchedule, gate::GateConfig};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub fares: FareSchedule,
    pub gate: GateConfig,
    /// Records fetched per ledger round trip when walking a history.
    pub history_page_size: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            fares: FareSchedule::default(),
            gate: GateConfig::default(),
            history_page_size: 50,
        }
    }
}

impl WalletConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(
                Environment::with_prefix("WALLET")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
