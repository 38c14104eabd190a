//! Conversation command handler.

use arag_core::{config::AppConfig, AppResult};
use arag_history::{ConversationId, ConversationStore, SqliteConversationStore};
use clap::{Args, Subcommand};

use super::print_json;

/// Manage stored conversations
#[derive(Args, Debug)]
pub struct ConversationCommand {
    #[command(subcommand)]
    pub action: ConversationAction,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConversationAction {
    /// Start a new conversation
    New { title: String },
    /// List conversations, most recently updated first
    List,
    /// Show a conversation with its messages
    Show { id: ConversationId },
    /// Change a conversation's title
    Rename { id: ConversationId, title: String },
    /// Delete a conversation and its messages
    Delete { id: ConversationId },
}

impl ConversationCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = SqliteConversationStore::open(config.history_path()).await?;

        match &self.action {
            ConversationAction::New { title } => {
                let conversation = store.create(title).await?;
                if self.json {
                    return print_json(&conversation);
                }
                println!("Created conversation {}: {}", conversation.id, conversation.title);
            }
            ConversationAction::List => {
                let conversations = store.list().await?;
                if self.json {
                    return print_json(&conversations);
                }
                if conversations.is_empty() {
                    println!("No conversations");
                }
                for c in conversations {
                    println!(
                        "{:>4}  {}  ({} messages, updated {})",
                        c.id,
                        c.title,
                        c.message_count,
                        c.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            ConversationAction::Show { id } => {
                let conversation = store.get(*id).await?;
                if self.json {
                    return print_json(&conversation);
                }
                println!("# {}", conversation.title);
                for message in &conversation.messages {
                    println!();
                    println!("{}: {}", message.role.as_str(), message.content);
                    for source in &message.sources {
                        println!("  - {}", source.source.as_deref().unwrap_or("web search"));
                    }
                }
            }
            ConversationAction::Rename { id, title } => {
                let conversation = store.rename(*id, title).await?;
                if self.json {
                    return print_json(&conversation);
                }
                println!("Renamed conversation {} to '{}'", conversation.id, conversation.title);
            }
            ConversationAction::Delete { id } => {
                store.delete(*id).await?;
                println!("Deleted conversation {}", id);
            }
        }

        Ok(())
    }
}
