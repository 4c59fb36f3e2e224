//! Inbound message pipeline
//!
//! `extract → (fetch media) → respond → send`, once per webhook delivery.
//! Every step after extraction degrades instead of failing: a media download
//! error turns into a text-only request, a provider error into the fallback
//! reply ([`FALLBACK_REPLY`](crate::agent::FALLBACK_REPLY) unless configured),
//! and a send error is only logged. Nothing here is retried.

use std::sync::Arc;

use crate::agent::{Attachment, FALLBACK_REPLY, Responder, ResponseRequest, respond_or_fallback};
use crate::channels::whatsapp::MAX_CAPTION_CHARS;
use crate::channels::{Channel, InboundContent, InboundMessage, MediaKind, OutgoingBody, OutgoingMessage};
use crate::prompt::describe_inbound;

/// What happened to an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Unsupported message type, nothing sent
    Ignored,
    /// Reply delivered
    Replied,
    /// Reply generated but the send failed
    ReplyFailed,
}

/// Connects a channel to a responder
#[derive(Clone)]
pub struct Relay {
    channel: Arc<dyn Channel>,
    responder: Arc<dyn Responder>,
    file_search: bool,
    echo_media: bool,
    fallback_reply: String,
}

impl Relay {
    /// Create a relay with file search and media echo disabled
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>, responder: Arc<dyn Responder>) -> Self {
        Self {
            channel,
            responder,
            file_search: false,
            echo_media: false,
            fallback_reply: FALLBACK_REPLY.to_string(),
        }
    }

    /// Let the responder search the knowledge base
    #[must_use]
    pub const fn file_search(mut self, enabled: bool) -> Self {
        self.file_search = enabled;
        self
    }

    /// Echo inbound images/documents back with the answer as caption
    #[must_use]
    pub const fn echo_media(mut self, enabled: bool) -> Self {
        self.echo_media = enabled;
        self
    }

    /// Reply sent when the responder fails
    #[must_use]
    pub fn fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    /// Handle one inbound message, sending at most one reply
    pub async fn handle(&self, inbound: &InboundMessage) -> RelayOutcome {
        if let InboundContent::Unsupported { kind } = &inbound.content {
            tracing::info!(from = %inbound.sender_id, kind = %kind, "unsupported message type, ignoring");
            return RelayOutcome::Ignored;
        }

        tracing::info!(
            from = %inbound.sender_id,
            name = inbound.sender_name.as_deref().unwrap_or("-"),
            kind = inbound.content.kind(),
            id = %inbound.id,
            "processing WhatsApp message"
        );

        let request = self.build_request(inbound).await;
        let answer = respond_or_fallback(self.responder.as_ref(), &request, &self.fallback_reply).await;
        let reply = compose_reply(inbound, answer, self.echo_media);
        let kind = reply.kind();

        match self.channel.send(reply).await {
            Ok(()) => RelayOutcome::Replied,
            Err(e) => {
                tracing::error!(
                    channel = self.channel.name(),
                    to = %inbound.sender_id,
                    kind,
                    error = %e,
                    "failed to send reply"
                );
                RelayOutcome::ReplyFailed
            }
        }
    }

    /// Build the responder request, downloading media first when present
    pub async fn build_request(&self, inbound: &InboundMessage) -> ResponseRequest {
        let mut attachment = None;
        let mut media_unavailable = false;

        let media = inbound.content.downloadable_media().filter(|media| {
            let accepted = media
                .mime_type
                .as_deref()
                .is_none_or(|mime| self.responder.accepts_attachment(mime));
            if !accepted {
                tracing::debug!(
                    media_id = %media.media_id,
                    mime = ?media.mime_type,
                    "media type not accepted by the responder, not downloading"
                );
            }
            accepted
        });

        if let Some(media) = media {
            match self.channel.fetch_media(&media.media_id).await {
                Ok(fetched) => {
                    attachment = Some(Attachment {
                        mime_type: fetched.mime_type,
                        filename: match &inbound.content {
                            InboundContent::Document { filename, .. } => filename.clone(),
                            _ => None,
                        },
                        data: fetched.data,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        media_id = %media.media_id,
                        error = %e,
                        "media download failed, continuing text-only"
                    );
                    media_unavailable = true;
                }
            }
        }

        ResponseRequest {
            sender_id: inbound.sender_id.clone(),
            text: describe_inbound(&inbound.content, media_unavailable),
            attachment,
            file_search: self.file_search,
        }
    }
}

/// Choose the reply shape for an answer
///
/// Always text, except that with `echo_media` an inbound image or document
/// is sent back with the answer as its caption, provided the answer fits the
/// caption limit.
#[must_use]
pub fn compose_reply(inbound: &InboundMessage, answer: String, echo_media: bool) -> OutgoingMessage {
    let echoed = match &inbound.content {
        InboundContent::Image { media, .. } => Some((MediaKind::Image, media)),
        InboundContent::Document { media, .. } => Some((MediaKind::Document, media)),
        _ => None,
    };

    match echoed {
        Some((kind, media)) if echo_media && answer.chars().count() <= MAX_CAPTION_CHARS => {
            OutgoingMessage {
                recipient_id: inbound.sender_id.clone(),
                body: OutgoingBody::Media {
                    kind,
                    media_id: media.media_id.clone(),
                    caption: Some(answer),
                },
            }
        }
        _ => OutgoingMessage::text(inbound.sender_id.clone(), answer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::MediaRef;

    fn image_message() -> InboundMessage {
        InboundMessage {
            id: "wamid.1".to_string(),
            sender_id: "15551234567".to_string(),
            sender_name: None,
            content: InboundContent::Image {
                media: MediaRef {
                    media_id: "M1".to_string(),
                    mime_type: Some("image/jpeg".to_string()),
                },
                caption: None,
            },
        }
    }

    #[test]
    fn test_reply_is_text_by_default() {
        let reply = compose_reply(&image_message(), "A cat".to_string(), false);
        assert_eq!(reply, OutgoingMessage::text("15551234567", "A cat"));
    }

    #[test]
    fn test_echo_image_with_caption() {
        let reply = compose_reply(&image_message(), "A cat".to_string(), true);
        assert_eq!(
            reply.body,
            OutgoingBody::Media {
                kind: MediaKind::Image,
                media_id: "M1".to_string(),
                caption: Some("A cat".to_string()),
            }
        );
    }

    #[test]
    fn test_long_answer_is_not_a_caption() {
        let answer = "x".repeat(MAX_CAPTION_CHARS + 1);
        let reply = compose_reply(&image_message(), answer, true);
        assert_eq!(reply.kind(), "text");
    }

    #[test]
    fn test_echo_only_applies_to_image_and_document() {
        let mut inbound = image_message();
        inbound.content = InboundContent::Sticker {
            media: MediaRef {
                media_id: "S1".to_string(),
                mime_type: None,
            },
            animated: false,
        };
        assert_eq!(compose_reply(&inbound, "ok".to_string(), true).kind(), "text");
    }
}
