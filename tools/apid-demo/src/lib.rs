//! Shared setup for the demo binaries.
//!
//! Both binaries read the standard `APID*` environment, accept an
//! `--address` override and log through `tracing` (`RUST_LOG`, falling back
//! to `APID_LOG_LEVEL`, default `info`).

use anyhow::{Context, Result};
use apid::{ApidConfig, BrokerAddress};
use clap::Args;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_VAR: &str = "APID_LOG_LEVEL";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Connection options shared by the demo binaries.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Broker address, `unix:<path>` or `tcp:<host>:<port>` (overrides $APID)
    #[arg(short, long)]
    pub address: Option<BrokerAddress>,
}

impl ConnectArgs {
    /// Environment configuration with the command-line override applied.
    pub fn config(&self) -> Result<ApidConfig> {
        let config = ApidConfig::from_env().context("invalid APID environment")?;
        Ok(match &self.address {
            Some(address) => config.with_address(address.clone()),
            None => config,
        })
    }
}

/// Install the global `tracing` subscriber.
pub fn init_logging() -> Result<()> {
    let level = std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .with_context(|| format!("invalid log filter {:?}", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install subscriber: {}", e))
}
