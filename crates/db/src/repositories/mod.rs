use async_trait::async_trait;
use thiserror::Error;

use dirtybox_core::ConversationTurn;

pub mod conversation;
pub mod memory;

pub use conversation::SqlConversationRepository;
pub use memory::InMemoryConversationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only message log, the only cross-request state in the system.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn append(&self, turn: ConversationTurn) -> Result<(), RepositoryError>;

    /// The last `limit` turns for a contact, oldest first.
    async fn last_n(
        &self,
        contact_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError>;

    async fn count(&self, contact_id: &str) -> Result<i64, RepositoryError>;
}
