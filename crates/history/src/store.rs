//! Conversation persistence interface.

use arag_core::AppResult;
use arag_knowledge::EvidenceChunk;
use arag_workflow::Role;
use async_trait::async_trait;

use crate::types::{Conversation, ConversationId, ConversationSummary, StoredMessage};

/// Persistence collaborator for conversations.
///
/// Unknown ids are reported as `AppError::NotFound`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create(&self, title: &str) -> AppResult<Conversation>;

    async fn get(&self, id: ConversationId) -> AppResult<Conversation>;

    /// Append a message and bump the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        role: Role,
        content: &str,
        sources: &[EvidenceChunk],
    ) -> AppResult<StoredMessage>;

    /// All conversations, most recently updated first.
    async fn list(&self) -> AppResult<Vec<ConversationSummary>>;

    async fn rename(&self, id: ConversationId, title: &str) -> AppResult<Conversation>;

    /// Delete a conversation with its messages and sources.
    async fn delete(&self, id: ConversationId) -> AppResult<()>;
}
