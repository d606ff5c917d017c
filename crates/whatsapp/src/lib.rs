pub mod client;
pub mod menus;
pub mod payload;

pub use client::{
    ButtonPrompt, HttpWhatsAppGateway, ListMenu, MenuRow, MenuSection, RecordingGateway,
    SentMessage, TransportError, WhatsAppGateway,
};
pub use payload::{InboundMessage, WebhookPayload};
