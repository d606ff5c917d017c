use serde::{Deserialize, Serialize};

use dirtybox_core::{ContactProfile, TurnKind};

/// One webhook delivery from the WhatsApp provider.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub message_type: String,
    pub message: Option<MessageBody>,
    pub contact: Option<ContactMeta>,
    pub contact_id: Option<String>,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub thread_id: Option<String>,
    pub whatsapp_message_id: Option<String>,
    pub status: Option<String>,
    pub is_delivered_to_contact: Option<bool>,
    pub is_read_by_contact: Option<bool>,
    pub is_failed: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MessageBody {
    pub text: Option<TextBody>,
    pub interactive: Option<InteractiveBody>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InteractiveBody {
    #[serde(rename = "type")]
    pub reply_type: Option<String>,
    pub list_reply: Option<ReplyOption>,
    pub button_reply: Option<ReplyOption>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplyOption {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ContactMeta {
    pub name: Option<String>,
    pub phone_no: Option<String>,
    pub wa_id: Option<String>,
}

/// The inbound message reduced to the three shapes the router dispatches on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    ListReply { id: String, title: String },
    ButtonReply { id: String, title: String },
    Unsupported { message_type: String },
}

impl WebhookPayload {
    pub fn inbound_message(&self) -> InboundMessage {
        match self.message_type.as_str() {
            "text" => {
                let body = self
                    .message
                    .as_ref()
                    .and_then(|message| message.text.as_ref())
                    .map(|text| text.body.trim().to_owned())
                    .unwrap_or_default();
                InboundMessage::Text(body)
            }
            "interactive" => {
                let Some(interactive) =
                    self.message.as_ref().and_then(|message| message.interactive.as_ref())
                else {
                    return InboundMessage::Unsupported {
                        message_type: self.message_type.clone(),
                    };
                };

                if let Some(reply) = &interactive.list_reply {
                    return InboundMessage::ListReply {
                        id: reply.id.clone(),
                        title: reply.title.clone(),
                    };
                }
                if let Some(reply) = &interactive.button_reply {
                    return InboundMessage::ButtonReply {
                        id: reply.id.clone(),
                        title: reply.title.clone(),
                    };
                }
                InboundMessage::Unsupported { message_type: self.message_type.clone() }
            }
            other => InboundMessage::Unsupported { message_type: other.to_owned() },
        }
    }

    pub fn turn_kind(&self) -> TurnKind {
        match self.message_type.as_str() {
            "interactive" => TurnKind::Interactive,
            "template" => TurnKind::Template,
            _ => TurnKind::Text,
        }
    }

    /// Raw content string for the message log.
    pub fn log_content(&self) -> String {
        match self.inbound_message() {
            InboundMessage::Text(body) => body,
            InboundMessage::ListReply { id, title } | InboundMessage::ButtonReply { id, title } => {
                format!("{title} [{id}]")
            }
            InboundMessage::Unsupported { message_type } => {
                format!("<unsupported:{message_type}>")
            }
        }
    }

    pub fn contact_profile(&self) -> ContactProfile {
        let meta = self.contact.clone().unwrap_or_default();
        ContactProfile { name: meta.name, phone: meta.phone_no, wa_id: meta.wa_id }
    }
}
