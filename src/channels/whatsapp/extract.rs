//! Normalization of webhook messages into [`InboundMessage`]

use serde::{Deserialize, Serialize};

use super::types::{
    WebhookContact, WebhookContactCard, WebhookLocation, WebhookMedia, WebhookMessage,
    WebhookText, WhatsAppWebhook,
};

/// A message received from a `WhatsApp` user
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Provider message ID
    pub id: String,

    /// Sender phone number, also the reply address
    pub sender_id: String,

    /// Sender profile name, if the provider included one
    pub sender_name: Option<String>,

    /// Type-specific payload
    pub content: InboundContent,
}

/// Type-specific payload of an inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundContent {
    Text {
        body: String,
    },
    Image {
        media: MediaRef,
        caption: Option<String>,
    },
    Audio {
        media: MediaRef,
    },
    Document {
        media: MediaRef,
        filename: Option<String>,
        caption: Option<String>,
    },
    Location(Location),
    Contacts(Vec<ContactCard>),
    Sticker {
        media: MediaRef,
        animated: bool,
    },
    /// Anything else (reactions, video, interactive replies, ...)
    Unsupported {
        kind: String,
    },
}

impl InboundContent {
    /// The message type tag
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Audio { .. } => "audio",
            Self::Document { .. } => "document",
            Self::Location(_) => "location",
            Self::Contacts(_) => "contacts",
            Self::Sticker { .. } => "sticker",
            Self::Unsupported { kind } => kind,
        }
    }

    /// Media that should be downloaded before asking the model
    ///
    /// Audio and animated stickers are not included: the model is only told
    /// they arrived.
    #[must_use]
    pub const fn downloadable_media(&self) -> Option<&MediaRef> {
        match self {
            Self::Image { media, .. }
            | Self::Document { media, .. }
            | Self::Sticker {
                media,
                animated: false,
            } => Some(media),
            _ => None,
        }
    }
}

/// Reference to a media object held by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub media_id: String,
    pub mime_type: Option<String>,
}

/// A geographic location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A shared contact card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCard {
    /// Display name; empty when the card carried none
    pub formatted_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phones: Vec<ContactPhone>,
}

/// A phone number on a contact card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPhone {
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
}

/// Extract the first message from a webhook payload
///
/// Returns `None` for deliveries that carry no message (status receipts,
/// account updates) or whose first message has no sender. Later messages in
/// the same delivery are neither decoded nor handled.
#[must_use]
pub fn extract_message(payload: &WhatsAppWebhook) -> Option<InboundMessage> {
    let value = payload
        .entry
        .iter()
        .flat_map(|entry| &entry.changes)
        .map(|change| &change.value)
        .find(|value| !value.messages.is_empty())?;

    let message = match WebhookMessage::deserialize(value.messages.first()?) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable WhatsApp message");
            return None;
        }
    };
    if message.from.is_empty() {
        tracing::warn!(id = %message.id, "WhatsApp message without sender");
        return None;
    }

    let contacts: Vec<WebhookContact> = value
        .contacts
        .iter()
        .filter_map(|c| WebhookContact::deserialize(c).ok())
        .collect();
    let sender_name = contacts
        .iter()
        .find(|c| c.wa_id.as_deref() == Some(message.from.as_str()))
        .or_else(|| contacts.first())
        .and_then(|c| c.profile.as_ref())
        .and_then(|p| p.name.clone())
        .filter(|n| !n.is_empty());

    Some(InboundMessage {
        content: extract_content(&message),
        id: message.id,
        sender_id: message.from,
        sender_name,
    })
}

fn extract_content(message: &WebhookMessage) -> InboundContent {
    let unsupported = || InboundContent::Unsupported {
        kind: message.message_type.clone(),
    };
    let media = |key: &str| message.block::<WebhookMedia>(key).filter(|m| !m.id.is_empty());

    match message.message_type.as_str() {
        "text" => message
            .block::<WebhookText>("text")
            .map_or_else(unsupported, |t| InboundContent::Text { body: t.body }),
        "image" => media("image").map_or_else(unsupported, |m| InboundContent::Image {
            caption: non_empty(m.caption.clone()),
            media: media_ref(m),
        }),
        "audio" => media("audio").map_or_else(unsupported, |m| InboundContent::Audio {
            media: media_ref(m),
        }),
        "document" => media("document").map_or_else(unsupported, |m| InboundContent::Document {
            filename: non_empty(m.filename.clone()),
            caption: non_empty(m.caption.clone()),
            media: media_ref(m),
        }),
        "sticker" => media("sticker").map_or_else(unsupported, |m| InboundContent::Sticker {
            animated: m.animated.unwrap_or(false),
            media: media_ref(m),
        }),
        "location" => message
            .block::<WebhookLocation>("location")
            .as_ref()
            .and_then(location)
            .map_or_else(unsupported, InboundContent::Location),
        "contacts" => message
            .block::<Vec<WebhookContactCard>>("contacts")
            .map_or_else(unsupported, |cards| {
                InboundContent::Contacts(cards.iter().map(contact_card).collect())
            }),
        _ => unsupported(),
    }
}

fn media_ref(media: WebhookMedia) -> MediaRef {
    MediaRef {
        media_id: media.id,
        mime_type: media.mime_type,
    }
}

fn location(raw: &WebhookLocation) -> Option<Location> {
    Some(Location {
        latitude: raw.latitude?,
        longitude: raw.longitude?,
        name: non_empty(raw.name.clone()),
        address: non_empty(raw.address.clone()),
    })
}

fn contact_card(raw: &WebhookContactCard) -> ContactCard {
    let name = raw.name.as_ref();
    let first_name = non_empty(name.and_then(|n| n.first_name.clone()));
    let last_name = non_empty(name.and_then(|n| n.last_name.clone()));

    let formatted_name = non_empty(name.and_then(|n| n.formatted_name.clone()))
        .unwrap_or_else(|| {
            [first_name.as_deref(), last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        });

    let phones = raw
        .phones
        .iter()
        .filter_map(|p| {
            Some(ContactPhone {
                phone: non_empty(p.phone.clone())?,
                wa_id: p.wa_id.clone(),
                phone_type: p.phone_type.clone(),
            })
        })
        .collect();

    ContactCard {
        formatted_name,
        first_name,
        last_name,
        phones,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
