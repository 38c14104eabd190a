//! Conversation history for the adaptive RAG assistant.
//!
//! Conversations, their messages, and the evidence behind each assistant
//! answer persist in `.arag/history.sqlite`.

pub mod sqlite;
pub mod store;
pub mod types;

pub use sqlite::SqliteConversationStore;
pub use store::ConversationStore;
pub use types::{Conversation, ConversationId, ConversationSummary, SourceRecord, StoredMessage};

use arag_workflow::Message;

/// Prior turns of a conversation in the shape the workflow consumes.
pub fn history_for(conversation: &Conversation) -> Vec<Message> {
    conversation
        .messages
        .iter()
        .map(|m| Message::new(m.role, m.content.clone()))
        .collect()
}
