//! `WhatsApp` channel adapter
//!
//! Uses the `WhatsApp` Cloud API (Graph API) for sending messages and
//! resolving inbound media. Receiving happens through the webhook handler in
//! [`crate::api::webhooks::whatsapp`], which feeds payloads to
//! [`extract_message`].

mod extract;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

pub use extract::{
    ContactCard, ContactPhone, InboundContent, InboundMessage, Location, MediaRef, extract_message,
};
pub use types::WhatsAppWebhook;

use super::{Channel, FetchedMedia, OutgoingBody, OutgoingMessage};
use crate::config::WhatsAppConfig;
use crate::{Error, Result};

/// Longest text body the Cloud API accepts
pub const MAX_TEXT_CHARS: usize = 4096;

/// Longest media caption the Cloud API accepts
pub const MAX_CAPTION_CHARS: usize = 1024;

/// `WhatsApp` channel adapter
pub struct WhatsAppChannel {
    /// Business API access token
    access_token: SecretString,
    /// Versioned Graph API base URL
    api_base: String,
    /// Send-message endpoint for the configured phone number
    messages_url: String,
    client: Client,
}

/// Media metadata returned by `GET /{media-id}`
#[derive(Debug, Deserialize)]
struct MediaInfo {
    /// Short-lived download URL
    url: Option<String>,
    mime_type: Option<String>,
}

impl WhatsAppChannel {
    /// Create a new `WhatsApp` channel adapter
    ///
    /// # Errors
    ///
    /// Returns error if the token or phone number ID is empty, or the HTTP
    /// client cannot be built
    pub fn new(config: &WhatsAppConfig, timeout: Duration) -> Result<Self> {
        if config.access_token.expose_secret().is_empty() {
            return Err(Error::Config("WhatsApp access token required".to_string()));
        }
        if config.phone_number_id.is_empty() {
            return Err(Error::Config("WhatsApp phone number ID required".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wachat-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            access_token: config.access_token.clone(),
            api_base: config.api_base.clone(),
            messages_url: config.messages_url(),
            client,
        })
    }

    /// URL of the send-message endpoint
    #[must_use]
    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    /// Build the Cloud API JSON payload for a message
    #[must_use]
    pub fn payload(message: &OutgoingMessage) -> Value {
        let mut body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": message.recipient_id,
            "type": message.kind(),
        });

        match &message.body {
            OutgoingBody::Text(text) => {
                let text = truncate_chars(text, MAX_TEXT_CHARS);
                body["text"] = json!({
                    "body": text,
                    "preview_url": text.contains("https://") || text.contains("http://"),
                });
            }
            OutgoingBody::Media {
                kind,
                media_id,
                caption,
            } => {
                let mut media = json!({ "id": media_id });
                match caption.as_deref().filter(|c| !c.is_empty()) {
                    Some(caption) if kind.supports_caption() => {
                        media["caption"] = json!(truncate_chars(caption, MAX_CAPTION_CHARS));
                    }
                    Some(_) => {
                        tracing::debug!(kind = kind.as_str(), "caption not supported, dropping");
                    }
                    None => {}
                }
                body[kind.as_str()] = media;
            }
            OutgoingBody::Location(location) => {
                body["location"] = json!(location);
            }
            OutgoingBody::Contacts(cards) => {
                let contacts: Vec<Value> = cards
                    .iter()
                    .map(|card| {
                        let first_name = card
                            .first_name
                            .clone()
                            .unwrap_or_else(|| card.formatted_name.clone());
                        let mut name = json!({
                            "formatted_name": card.formatted_name,
                            "first_name": first_name,
                        });
                        if let Some(last) = &card.last_name {
                            name["last_name"] = json!(last);
                        }
                        json!({ "name": name, "phones": card.phones })
                    })
                    .collect();
                body["contacts"] = Value::Array(contacts);
            }
        }

        body
    }

    /// Send a message through the Cloud API
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or returns a non-success status
    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        let body = Self::payload(message);

        tracing::debug!(to = %message.recipient_id, kind = message.kind(), "sending WhatsApp message");

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("WhatsApp API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "WhatsApp API error: {status} - {body}"
            )));
        }

        tracing::info!(to = %message.recipient_id, kind = message.kind(), "WhatsApp message sent");
        Ok(())
    }

    /// Download an inbound media object
    ///
    /// Resolves the short-lived download URL first, then fetches the bytes
    /// with the same bearer token.
    ///
    /// # Errors
    ///
    /// Returns error if either request fails or returns a non-success status
    pub async fn download_media(&self, media_id: &str) -> Result<FetchedMedia> {
        let info_url = format!("{}/{media_id}", self.api_base);

        let response = self
            .client
            .get(&info_url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Media(format!("media lookup failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Media(format!(
                "media lookup failed: {status} - {body}"
            )));
        }

        let info: MediaInfo = response
            .json()
            .await
            .map_err(|e| Error::Media(format!("invalid media metadata: {e}")))?;

        let Some(download_url) = info.url.filter(|u| !u.is_empty()) else {
            return Err(Error::Media(format!("no download URL for media {media_id}")));
        };

        let response = self
            .client
            .get(&download_url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Media(format!("media download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Media(format!(
                "media download failed: {}",
                response.status()
            )));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Media(format!("media download failed: {e}")))?
            .to_vec();

        let mime_type = info
            .mime_type
            .or(header_mime)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        tracing::info!(media_id, bytes = data.len(), mime = %mime_type, "WhatsApp media downloaded");

        Ok(FetchedMedia { mime_type, data })
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.send_message(&message).await
    }

    async fn fetch_media(&self, media_id: &str) -> Result<FetchedMedia> {
        self.download_media(media_id).await
    }
}

/// Truncate to at most `max` characters, marking the cut with an ellipsis
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MediaKind;

    fn media(kind: MediaKind, caption: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            recipient_id: "15550001111".to_string(),
            body: OutgoingBody::Media {
                kind,
                media_id: "MEDIA".to_string(),
                caption: caption.map(ToString::to_string),
            },
        }
    }

    #[test]
    fn test_text_payload() {
        let payload = WhatsAppChannel::payload(&OutgoingMessage::text("15550001111", "Hi there"));

        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["to"], "15550001111");
        assert_eq!(payload["type"], "text");
        assert_eq!(payload["text"]["body"], "Hi there");
        assert_eq!(payload["text"]["preview_url"], false);
    }

    #[test]
    fn test_text_payload_is_truncated() {
        let long = "a".repeat(MAX_TEXT_CHARS + 10);
        let payload = WhatsAppChannel::payload(&OutgoingMessage::text("1", long));
        let body = payload["text"]["body"].as_str().unwrap();

        assert_eq!(body.chars().count(), MAX_TEXT_CHARS);
        assert!(body.ends_with('…'));
    }

    #[test]
    fn test_image_payload_keeps_caption() {
        let payload = WhatsAppChannel::payload(&media(MediaKind::Image, Some("nice")));

        assert_eq!(payload["type"], "image");
        assert_eq!(payload["image"]["id"], "MEDIA");
        assert_eq!(payload["image"]["caption"], "nice");
    }

    #[test]
    fn test_sticker_payload_drops_caption() {
        let payload = WhatsAppChannel::payload(&media(MediaKind::Sticker, Some("ignored")));

        assert_eq!(payload["type"], "sticker");
        assert_eq!(payload["sticker"]["id"], "MEDIA");
        assert!(payload["sticker"].get("caption").is_none());
    }

    #[test]
    fn test_location_payload() {
        let message = OutgoingMessage {
            recipient_id: "1".to_string(),
            body: OutgoingBody::Location(Location {
                latitude: 19.4326,
                longitude: -99.1332,
                name: Some("Zocalo".to_string()),
                address: None,
            }),
        };
        let payload = WhatsAppChannel::payload(&message);

        assert_eq!(payload["type"], "location");
        assert_eq!(payload["location"]["latitude"], 19.4326);
        assert_eq!(payload["location"]["name"], "Zocalo");
        assert!(payload["location"].get("address").is_none());
    }

    #[test]
    fn test_contacts_payload() {
        let message = OutgoingMessage {
            recipient_id: "1".to_string(),
            body: OutgoingBody::Contacts(vec![ContactCard {
                formatted_name: "Jane Roe".to_string(),
                first_name: None,
                last_name: Some("Roe".to_string()),
                phones: vec![ContactPhone {
                    phone: "+15550002222".to_string(),
                    wa_id: None,
                    phone_type: Some("CELL".to_string()),
                }],
            }]),
        };
        let payload = WhatsAppChannel::payload(&message);

        assert_eq!(payload["type"], "contacts");
        let card = &payload["contacts"][0];
        assert_eq!(card["name"]["formatted_name"], "Jane Roe");
        assert_eq!(card["name"]["first_name"], "Jane Roe");
        assert_eq!(card["name"]["last_name"], "Roe");
        assert_eq!(card["phones"][0]["phone"], "+15550002222");
        assert_eq!(card["phones"][0]["type"], "CELL");
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo wörld", 5), "héll…");
    }

    #[test]
    fn test_new_rejects_empty_phone_id() {
        let config = WhatsAppConfig {
            access_token: SecretString::from("token"),
            phone_number_id: String::new(),
            verify_token: SecretString::from("verify"),
            api_base: crate::config::DEFAULT_WHATSAPP_API_BASE.to_string(),
        };
        assert!(WhatsAppChannel::new(&config, Duration::from_secs(1)).is_err());
    }
}
