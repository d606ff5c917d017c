use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::snapshot::StructuredData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Text,
    Template,
    Interactive,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Template => "template",
            Self::Interactive => "interactive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "template" => Some(Self::Template),
            "interactive" => Some(Self::Interactive),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    FromContact,
    FromAgent,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub wa_id: Option<String>,
}

/// One logged message, inbound or outbound. Created once per webhook
/// delivery or outbound send; never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub contact_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub whatsapp_message_id: Option<String>,
    pub kind: TurnKind,
    pub content: String,
    pub direction: Direction,
    pub is_delivered: bool,
    pub is_read: bool,
    pub is_failed: bool,
    pub snapshot: Option<StructuredData>,
    pub contact: ContactProfile,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn inbound(
        contact_id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        kind: TurnKind,
        content: impl Into<String>,
        whatsapp_message_id: Option<String>,
        contact: ContactProfile,
    ) -> Self {
        Self {
            contact_id: contact_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            whatsapp_message_id,
            kind,
            content: content.into(),
            direction: Direction::FromContact,
            is_delivered: true,
            is_read: false,
            is_failed: false,
            snapshot: None,
            contact,
            created_at: Utc::now(),
        }
    }

    pub fn outbound(
        contact_id: impl Into<String>,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        kind: TurnKind,
        content: impl Into<String>,
        snapshot: Option<StructuredData>,
        contact: ContactProfile,
    ) -> Self {
        Self {
            contact_id: contact_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            whatsapp_message_id: None,
            kind,
            content: content.into(),
            direction: Direction::FromAgent,
            is_delivered: false,
            is_read: true,
            is_failed: false,
            snapshot,
            contact,
            created_at: Utc::now(),
        }
    }
}
