use std::sync::Mutex;

use async_trait::async_trait;

use dirtybox_core::ConversationTurn;

use super::{ConversationRepository, RepositoryError};

/// In-memory log for tests and wiring without a database.
#[derive(Default)]
pub struct InMemoryConversationRepository {
    turns: Mutex<Vec<ConversationTurn>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.lock().expect("turn log lock").clone()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn append(&self, turn: ConversationTurn) -> Result<(), RepositoryError> {
        self.turns.lock().expect("turn log lock").push(turn);
        Ok(())
    }

    async fn last_n(
        &self,
        contact_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let turns = self.turns.lock().expect("turn log lock");
        let matching: Vec<ConversationTurn> =
            turns.iter().filter(|turn| turn.contact_id == contact_id).cloned().collect();
        let start = matching.len().saturating_sub(limit as usize);
        Ok(matching[start..].to_vec())
    }

    async fn count(&self, contact_id: &str) -> Result<i64, RepositoryError> {
        let turns = self.turns.lock().expect("turn log lock");
        Ok(turns.iter().filter(|turn| turn.contact_id == contact_id).count() as i64)
    }
}
