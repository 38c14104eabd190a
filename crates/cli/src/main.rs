//! arag CLI
//!
//! Main entry point for the adaptive RAG assistant.
//! Answers questions from a local evidence index, the web, or the model
//! itself, and checks its own answers before returning them.

mod commands;

use arag_core::{config::AppConfig, logging, AppResult};
use clap::{Parser, Subcommand};
use commands::{AskCommand, ConversationCommand, IndexCommand, IngestCommand};
use std::path::PathBuf;

/// arag - adaptive retrieval-augmented question answering
#[derive(Parser, Debug)]
#[command(name = "arag")]
#[command(about = "Adaptive retrieval-augmented question answering", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ARAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ARAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true, env = "ARAG_LOG_FORMAT")]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider
    #[arg(short, long, global = true, env = "ARAG_PROVIDER")]
    provider: Option<String>,

    /// Model used for answer generation
    #[arg(long, global = true, env = "ARAG_CHAT_MODEL")]
    chat_model: Option<String>,

    /// Model used for routing, grading, and rewriting
    #[arg(long, global = true, env = "ARAG_RAG_MODEL")]
    rag_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question
    Ask(AskCommand),

    /// Add documents to the evidence index
    Ingest(IngestCommand),

    /// Inspect or clear the evidence index
    Index(IndexCommand),

    /// Manage stored conversations
    Conversation(ConversationCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.chat_model,
        cli.rag_model,
        cli.log_level,
        cli.log_format,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(
        config.log_level.as_deref(),
        logging::LogFormat::parse(&config.log_format),
        config.no_color,
    )?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Models: chat={} rag={}", config.chat_model, config.rag_model);

    config.ensure_arag_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Ingest(_) => "ingest",
        Commands::Index(_) => "index",
        Commands::Conversation(_) => "conversation",
    };
    let span = tracing::info_span!("command", name = command_name);
    let _guard = span.enter();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Conversation(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
