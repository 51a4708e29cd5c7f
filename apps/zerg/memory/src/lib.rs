//! Chat memory CLI
//!
//! Operator front-end for the long-term chat memory store.
//!
//! ```text
//! zerg-memory (clap)
//!   ↓
//! MemoryStore (domain_memory)
//!   ↓
//! ┌─────────────┬──────────────────┐
//! │ QdrantIndex │ EmbeddingProvider│
//! └─────────────┴──────────────────┘
//! ```
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

pub mod commands;

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_memory::embedding::provider_from_env;
use domain_memory::{EmbeddingSettings, MemoryConfig, MemoryStore};
use eyre::{Result, WrapErr};
use tracing::info;

pub use commands::{Cli, Commands};

/// Parse arguments, connect the store and run one command.
pub async fn run() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    let config = MemoryConfig::from_env().wrap_err("Failed to load memory configuration")?;
    let settings = EmbeddingSettings::from_env().wrap_err("Failed to load embedding settings")?;
    let provider = provider_from_env(&settings).wrap_err("Failed to build embedding provider")?;

    info!(
        collection = %config.collection,
        provider = provider.name(),
        "Connecting to memory store"
    );
    let store = MemoryStore::connect(&config, provider)
        .await
        .wrap_err("Failed to connect memory store")?;

    let output = commands::execute(store, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
