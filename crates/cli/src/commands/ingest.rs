//! Ingest command handler.
//!
//! Loads documents from disk into the evidence store.

use std::path::PathBuf;
use std::time::Instant;

use arag_core::{config::AppConfig, AppResult};
use arag_knowledge::load_documents;
use clap::Args;

use super::{print_json, Services};

/// Add documents to the evidence index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Provenance label recorded for the ingested documents
    #[arg(long)]
    pub provenance: Option<String>,

    /// Clear the index before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} path(s)", self.paths.len());
        let started = Instant::now();

        let loaded = load_documents(&self.paths, self.provenance.as_deref())?;
        for path in &loaded.skipped {
            tracing::info!("Skipped unsupported file {:?}", path);
        }

        let services = Services::open(config).await?;
        if self.reset {
            services.store.reset().await?;
            tracing::info!("Index cleared");
        }

        let stats = services.store.add(&loaded.documents).await?;
        let duration = started.elapsed().as_secs_f64();

        if self.json {
            let output = serde_json::json!({
                "documents": stats.documents,
                "chunks": stats.chunks,
                "skipped": loaded.skipped,
                "topicsUpdated": stats.topics_updated,
                "newTopics": stats.new_topics,
                "durationSecs": duration,
            });
            print_json(&output)
        } else {
            println!(
                "Ingested {} documents ({} chunks) in {:.2}s",
                stats.documents, stats.chunks, duration
            );
            if !loaded.skipped.is_empty() {
                println!("Skipped {} unsupported files", loaded.skipped.len());
            }
            if stats.chunks > 0 && !stats.topics_updated {
                println!("Warning: topics could not be extracted; routing may miss this content");
            } else if !stats.new_topics.is_empty() {
                println!("New topics: {}", stats.new_topics.join(", "));
            }
            Ok(())
        }
    }
}
