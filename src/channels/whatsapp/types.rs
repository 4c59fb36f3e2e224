//! `WhatsApp` Cloud API webhook payload types
//!
//! Every field is optional or defaulted: Meta delivers status updates, errors
//! and message events through the same endpoint, and a payload we cannot
//! fully understand must still deserialize so it can be acknowledged.
//!
//! Messages and contacts stay raw JSON inside the envelope. Only the message
//! being handled is decoded, and only the block matching its type, so a
//! malformed sibling or an unexpected incidental field cannot hide it.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// `WhatsApp` webhook payload from Cloud API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppWebhook {
    /// Subscription object, `whatsapp_business_account` for message events
    #[serde(default)]
    pub object: Option<String>,
    /// Webhook entries
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// `WhatsApp` webhook entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    /// Changes in this entry
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// `WhatsApp` webhook change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    /// The change value
    #[serde(default)]
    pub value: WebhookValue,
}

/// `WhatsApp` webhook value containing messages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookValue {
    /// Sender profiles for the messages in this change, see [`WebhookContact`]
    #[serde(default)]
    pub contacts: Vec<Value>,
    /// Incoming messages (empty for status-only deliveries), see [`WebhookMessage`]
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Delivery/read receipts for messages we sent
    #[serde(default)]
    pub statuses: Vec<Value>,
}

/// Sender profile attached to a message event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContact {
    /// `WhatsApp` ID (phone number)
    #[serde(default)]
    pub wa_id: Option<String>,
    /// Public profile
    #[serde(default)]
    pub profile: Option<WebhookProfile>,
}

/// Public profile of a sender
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookProfile {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// `WhatsApp` message
///
/// The common header is decoded eagerly; the type-specific block (`text`,
/// `image`, `location`, ...) is decoded on demand with [`Self::block`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    /// Sender phone number
    #[serde(default)]
    pub from: String,
    /// Message ID
    #[serde(default)]
    pub id: String,
    /// Message type
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Every other field, including the type-specific block and `timestamp`
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WebhookMessage {
    /// Decode the block stored under `key`
    ///
    /// Returns `None` when the block is absent or does not have the expected
    /// shape.
    #[must_use]
    pub fn block<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.fields.get(key)?;
        match T::deserialize(raw) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::debug!(id = %self.id, key, error = %e, "malformed message block");
                None
            }
        }
    }
}

/// `WhatsApp` text message content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookText {
    /// Message body
    #[serde(default)]
    pub body: String,
}

/// `WhatsApp` media object (image, audio, document, sticker)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMedia {
    /// Media ID (use to fetch URL)
    #[serde(default)]
    pub id: String,
    /// MIME type
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Caption (image, document)
    #[serde(default)]
    pub caption: Option<String>,
    /// Original filename (document)
    #[serde(default)]
    pub filename: Option<String>,
    /// Animated flag (sticker)
    #[serde(default)]
    pub animated: Option<bool>,
}

/// `WhatsApp` location content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookLocation {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// `WhatsApp` shared contact card
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContactCard {
    #[serde(default)]
    pub name: Option<WebhookContactName>,
    #[serde(default)]
    pub phones: Vec<WebhookContactPhone>,
}

/// Name block of a contact card
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContactName {
    #[serde(default)]
    pub formatted_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Phone entry of a contact card
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContactPhone {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(rename = "type", default)]
    pub phone_type: Option<String>,
}
