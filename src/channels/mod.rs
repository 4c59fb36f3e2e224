//! Messaging channel adapters
//!
//! The gateway talks to exactly one channel, the `WhatsApp` Cloud API, but
//! the relay only sees the [`Channel`] trait so tests can swap in a mock.

pub mod whatsapp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use whatsapp::{
    ContactCard, ContactPhone, InboundContent, InboundMessage, Location, MediaRef,
    WhatsAppChannel, WhatsAppWebhook, extract_message,
};

use crate::Result;

/// Kind of media object that can be sent by ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Document,
    Sticker,
    Video,
}

impl MediaKind {
    /// Wire name used as the message `type`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Video => "video",
        }
    }

    /// Whether the Cloud API accepts a caption for this kind
    #[must_use]
    pub const fn supports_caption(self) -> bool {
        matches!(self, Self::Image | Self::Document | Self::Video)
    }
}

/// Content of an outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingBody {
    /// Plain text
    Text(String),

    /// Previously uploaded media, referenced by ID
    Media {
        kind: MediaKind,
        media_id: String,
        caption: Option<String>,
    },

    /// A map pin
    Location(Location),

    /// One or more contact cards
    Contacts(Vec<ContactCard>),
}

/// A message to send through a channel
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    /// Recipient identifier (phone number for `WhatsApp`)
    pub recipient_id: String,

    /// What to send
    pub body: OutgoingBody,
}

impl OutgoingMessage {
    /// Create a text message
    #[must_use]
    pub fn text(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            body: OutgoingBody::Text(text.into()),
        }
    }

    /// Short label for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match &self.body {
            OutgoingBody::Text(_) => "text",
            OutgoingBody::Media { kind, .. } => kind.as_str(),
            OutgoingBody::Location(_) => "location",
            OutgoingBody::Contacts(_) => "contacts",
        }
    }
}

/// Media downloaded from a channel
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// MIME type reported by the provider
    pub mime_type: String,

    /// Raw bytes
    pub data: Vec<u8>,
}

/// A messaging channel able to deliver replies and resolve inbound media
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging
    fn name(&self) -> &'static str;

    /// Send one message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Download an inbound media object by its provider ID
    async fn fetch_media(&self, media_id: &str) -> Result<FetchedMedia>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_support() {
        assert!(MediaKind::Image.supports_caption());
        assert!(MediaKind::Document.supports_caption());
        assert!(!MediaKind::Audio.supports_caption());
        assert!(!MediaKind::Sticker.supports_caption());
    }

    #[test]
    fn test_outgoing_kind_label() {
        assert_eq!(OutgoingMessage::text("1", "hi").kind(), "text");

        let sticker = OutgoingMessage {
            recipient_id: "1".to_string(),
            body: OutgoingBody::Media {
                kind: MediaKind::Sticker,
                media_id: "S1".to_string(),
                caption: None,
            },
        };
        assert_eq!(sticker.kind(), "sticker");
    }
}
