use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("whatsapp gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("whatsapp gateway rejected the send: status {status}, body {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuSection {
    pub title: String,
    pub rows: Vec<MenuRow>,
}

/// List-type interactive message: a body, a button label and option sections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListMenu {
    pub body: String,
    pub button_label: String,
    pub sections: Vec<MenuSection>,
}

/// Button-type interactive message, at most two reply buttons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonPrompt {
    pub body: String,
    pub buttons: Vec<MenuRow>,
}

/// Fire-and-forget send primitives towards the WhatsApp provider gateway.
#[async_trait]
pub trait WhatsAppGateway: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), TransportError>;
    async fn send_list(&self, recipient: &str, menu: &ListMenu) -> Result<(), TransportError>;
    async fn send_buttons(
        &self,
        recipient: &str,
        prompt: &ButtonPrompt,
    ) -> Result<(), TransportError>;
    async fn mark_as_read(&self, message_id: &str) -> Result<(), TransportError>;
}

pub struct HttpWhatsAppGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
}

impl HttpWhatsAppGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url, api_token }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { status: status.as_u16(), body });
        }

        debug!(event_name = "whatsapp.send.accepted", path, "gateway accepted send");
        Ok(())
    }
}

#[async_trait]
impl WhatsAppGateway for HttpWhatsAppGateway {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        self.post(
            "/send-new-message",
            json!({
                "contact_id": recipient,
                "messageType": "text",
                "newMessage": text,
            }),
        )
        .await
    }

    async fn send_list(&self, recipient: &str, menu: &ListMenu) -> Result<(), TransportError> {
        let sections: Vec<serde_json::Value> = menu
            .sections
            .iter()
            .map(|section| {
                json!({
                    "title": section.title,
                    "rows": section.rows.iter().map(|row| json!({
                        "id": row.id,
                        "title": row.title,
                        "description": row.description,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();

        self.post(
            "/send-new-message",
            json!({
                "contact_id": recipient,
                "messageType": "interactive",
                "interactive": {
                    "type": "list",
                    "body": {"text": menu.body},
                    "action": {"button": menu.button_label, "sections": sections},
                },
            }),
        )
        .await
    }

    async fn send_buttons(
        &self,
        recipient: &str,
        prompt: &ButtonPrompt,
    ) -> Result<(), TransportError> {
        let buttons: Vec<serde_json::Value> = prompt
            .buttons
            .iter()
            .take(2)
            .map(|button| {
                json!({
                    "type": "reply",
                    "reply": {"id": button.id, "title": button.title},
                })
            })
            .collect();

        self.post(
            "/send-new-message",
            json!({
                "contact_id": recipient,
                "messageType": "interactive",
                "interactive": {
                    "type": "button",
                    "body": {"text": prompt.body},
                    "action": {"buttons": buttons},
                },
            }),
        )
        .await
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<(), TransportError> {
        self.post(
            "/mark-read",
            json!({
                "messaging_product": "whatsapp",
                "status": "read",
                "message_id": message_id,
            }),
        )
        .await
    }
}

/// Every outbound call captured in order, for assertions in tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SentMessage {
    Text { recipient: String, text: String },
    List { recipient: String, menu: ListMenu },
    Buttons { recipient: String, prompt: ButtonPrompt },
    MarkRead { message_id: String },
}

#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    pub fail_sends: bool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail_sends: true }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("sent log lock").clone()
    }

    fn record(&self, message: SentMessage) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Rejected { status: 502, body: "forced failure".to_owned() });
        }
        self.sent.lock().expect("sent log lock").push(message);
        Ok(())
    }
}

#[async_trait]
impl WhatsAppGateway for RecordingGateway {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        self.record(SentMessage::Text { recipient: recipient.to_owned(), text: text.to_owned() })
    }

    async fn send_list(&self, recipient: &str, menu: &ListMenu) -> Result<(), TransportError> {
        self.record(SentMessage::List { recipient: recipient.to_owned(), menu: menu.clone() })
    }

    async fn send_buttons(
        &self,
        recipient: &str,
        prompt: &ButtonPrompt,
    ) -> Result<(), TransportError> {
        self.record(SentMessage::Buttons {
            recipient: recipient.to_owned(),
            prompt: prompt.clone(),
        })
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<(), TransportError> {
        self.record(SentMessage::MarkRead { message_id: message_id.to_owned() })
    }
}
