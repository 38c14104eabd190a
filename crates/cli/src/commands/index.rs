//! Index command handler.

use arag_core::{config::AppConfig, AppResult};
use clap::{Args, Subcommand};

use super::{print_json, Services};

/// Inspect or clear the evidence index
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Show index statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the topics the router sees
    Topics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every segment and topic
    Reset,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let services = Services::open(config).await?;
        let store = &services.store;

        match &self.action {
            IndexAction::Stats { json } => {
                let stats = store.stats().await?;
                if *json {
                    return print_json(&stats);
                }
                println!("Evidence index: {:?}", store.db_path());
                println!("  Documents: {}", stats.documents);
                println!("  Segments: {}", stats.chunks);
                println!("  Topics: {}", stats.topics);
                println!("  DB size: {} bytes", stats.db_size_bytes);
                if let Some(last) = stats.last_ingested_at {
                    println!("  Last ingest: {}", last);
                }
            }
            IndexAction::Topics { json } => {
                let topics = store.topics();
                if *json {
                    return print_json(&topics);
                }
                if topics.is_empty() {
                    println!("No topics yet. Use 'arag ingest' to add documents.");
                }
                for topic in topics {
                    println!("{}", topic);
                }
            }
            IndexAction::Reset => {
                store.reset().await?;
                println!("Evidence index cleared");
            }
        }

        Ok(())
    }
}
