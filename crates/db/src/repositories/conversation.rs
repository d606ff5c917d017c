use chrono::{DateTime, Utc};
use sqlx::Row;

use dirtybox_core::{ContactProfile, ConversationTurn, Direction, StructuredData, TurnKind};

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append(&self, turn: ConversationTurn) -> Result<(), RepositoryError> {
        let details = turn
            .snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_turns (
                contact_id, sender_id, receiver_id, whatsapp_message_id, kind, content,
                direction, is_delivered, is_read, is_failed, details,
                contact_name, contact_phone, contact_wa_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&turn.contact_id)
        .bind(&turn.sender_id)
        .bind(&turn.receiver_id)
        .bind(&turn.whatsapp_message_id)
        .bind(turn.kind.as_str())
        .bind(&turn.content)
        .bind(direction_token(turn.direction))
        .bind(turn.is_delivered)
        .bind(turn.is_read)
        .bind(turn.is_failed)
        .bind(details)
        .bind(&turn.contact.name)
        .bind(&turn.contact.phone)
        .bind(&turn.contact.wa_id)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn last_n(
        &self,
        contact_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT contact_id, sender_id, receiver_id, whatsapp_message_id, kind, content,
                    direction, is_delivered, is_read, is_failed, details,
                    contact_name, contact_phone, contact_wa_id, created_at
             FROM conversation_turns
             WHERE contact_id = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(contact_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows
            .into_iter()
            .map(decode_turn)
            .collect::<Result<Vec<ConversationTurn>, RepositoryError>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn count(&self, contact_id: &str) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM conversation_turns WHERE contact_id = ?",
        )
        .bind(contact_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

fn direction_token(direction: Direction) -> &'static str {
    match direction {
        Direction::FromContact => "from_contact",
        Direction::FromAgent => "from_agent",
    }
}

fn decode_turn(row: sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let kind_raw = row.get::<String, _>("kind");
    let kind = TurnKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown turn kind `{kind_raw}`")))?;

    let direction = match row.get::<String, _>("direction").as_str() {
        "from_contact" => Direction::FromContact,
        "from_agent" => Direction::FromAgent,
        other => {
            return Err(RepositoryError::Decode(format!("unknown direction `{other}`")));
        }
    };

    let snapshot = row
        .get::<Option<String>, _>("details")
        .map(|raw| serde_json::from_str::<StructuredData>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(format!("invalid snapshot json: {error}")))?;

    let created_at_raw = row.get::<String, _>("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid created_at: {error}")))?
        .with_timezone(&Utc);

    Ok(ConversationTurn {
        contact_id: row.get("contact_id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        whatsapp_message_id: row.get("whatsapp_message_id"),
        kind,
        content: row.get("content"),
        direction,
        is_delivered: row.get("is_delivered"),
        is_read: row.get("is_read"),
        is_failed: row.get("is_failed"),
        snapshot,
        contact: ContactProfile {
            name: row.get("contact_name"),
            phone: row.get("contact_phone"),
            wa_id: row.get("contact_wa_id"),
        },
        created_at,
    })
}
