//! Command line surface and dispatch.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use domain_memory::{ImportReport, MemoryStore, MessageRecord, VectorIndex};
use eyre::{Result, WrapErr};
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "zerg-memory")]
#[command(about = "Long-term chat memory backed by a vector index")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a chat export (JSON array of messages) into a scope
    Import {
        /// Conversation scope the messages belong to
        #[arg(short, long, allow_hyphen_values = true)]
        scope: i64,

        /// Path of the export file
        file: PathBuf,

        /// Records per chunk. Overrides MEMORY_IMPORT_CHUNK_SIZE.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Concurrent embedding calls. Overrides MEMORY_IMPORT_CONCURRENCY.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Find stored messages similar to a query
    Search {
        #[arg(short, long, allow_hyphen_values = true)]
        scope: i64,

        query: String,

        #[arg(short, long, default_value_t = 5, allow_hyphen_values = true)]
        limit: i64,
    },

    /// Remember a single message
    Add {
        #[arg(short, long, allow_hyphen_values = true)]
        scope: i64,

        #[arg(short, long)]
        record_id: i64,

        text: String,

        #[arg(long, default_value_t = 0)]
        sender_id: i64,

        #[arg(long, default_value = "")]
        sender_name: String,

        /// Record id this message replies to
        #[arg(long)]
        reply_to: Option<i64>,
    },

    /// Forget every message of a scope
    Erase {
        #[arg(short, long, allow_hyphen_values = true)]
        scope: i64,
    },

    /// Show how many messages a scope holds
    Stats {
        #[arg(short, long, allow_hyphen_values = true)]
        scope: i64,
    },
}

/// Run one command and return its JSON output.
pub async fn execute<I>(store: MemoryStore<I>, command: Commands) -> Result<Value>
where
    I: VectorIndex,
{
    match command {
        Commands::Import {
            scope,
            file,
            chunk_size,
            concurrency,
        } => {
            let mut options = store.import_options();
            if let Some(chunk_size) = chunk_size {
                options = options.with_chunk_size(chunk_size);
            }
            if let Some(concurrency) = concurrency {
                options = options.with_concurrency(concurrency);
            }
            let store = store.with_import_options(options);

            info!(scope, file = %file.display(), "Starting import");
            let report = store
                .import_file(scope, &file)
                .await
                .wrap_err_with(|| format!("Import of {} failed", file.display()))?;
            Ok(report_json(scope, &report))
        }

        Commands::Search { scope, query, limit } => {
            let records = store.find_relevant(scope, &query, limit).await?;
            Ok(json!({
                "scope_id": scope,
                "query": query,
                "results": records,
            }))
        }

        Commands::Add {
            scope,
            record_id,
            text,
            sender_id,
            sender_name,
            reply_to,
        } => {
            let mut record = MessageRecord::new(scope, record_id, text, Utc::now()).with_sender(sender_id, sender_name);
            if let Some(reply_to) = reply_to {
                record = record.with_reply_to(reply_to);
            }
            let id = store.add_one(scope, record).await?;
            Ok(json!({
                "scope_id": scope,
                "record_id": record_id,
                "id": id.to_string(),
            }))
        }

        Commands::Erase { scope } => {
            store.erase_scope(scope).await?;
            Ok(json!({ "scope_id": scope, "erased": true }))
        }

        Commands::Stats { scope } => {
            let count = store.count_scope(scope).await?;
            Ok(json!({
                "scope_id": scope,
                "collection": store.collection(),
                "count": count,
            }))
        }
    }
}

fn report_json(scope: i64, report: &ImportReport) -> Value {
    if let Some(error) = &report.first_error {
        warn!(error = %error, "Import finished with errors");
    }
    json!({
        "scope_id": scope,
        "imported": report.imported,
        "skipped": report.skipped,
        "first_error": report.first_error.as_ref().map(|e| e.to_string()),
    })
}
