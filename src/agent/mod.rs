//! Response generation
//!
//! A [`Responder`] turns one [`ResponseRequest`] into reply text. The gateway
//! keeps no conversation state; every request stands alone.

pub mod openai;

use async_trait::async_trait;

pub use openai::OpenAiResponder;

use crate::Result;

/// Default reply sent to the user when the completion provider fails
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble processing your request right now. Please try again later.";

/// Binary content handed to the model alongside the text
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Whether this is an image the model can look at
    #[must_use]
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }

    /// Whether this is a PDF the model can read
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        is_pdf_mime(&self.mime_type)
    }
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_lowercase().starts_with("image/")
}

fn is_pdf_mime(mime_type: &str) -> bool {
    mime_type.trim().eq_ignore_ascii_case("application/pdf")
}

/// Everything needed to generate one reply
#[derive(Debug, Clone)]
pub struct ResponseRequest {
    /// Sender the reply is for
    pub sender_id: String,

    /// User turn text
    pub text: String,

    /// Downloaded media, if any
    pub attachment: Option<Attachment>,

    /// Let the provider search the configured knowledge base
    pub file_search: bool,
}

impl ResponseRequest {
    /// Create a text-only request
    #[must_use]
    pub fn text(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
            attachment: None,
            file_search: false,
        }
    }
}

/// Generates reply text for a user message
#[async_trait]
pub trait Responder: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Generate a reply
    async fn respond(&self, request: &ResponseRequest) -> Result<String>;

    /// Whether media of this MIME type can be attached to a request
    ///
    /// Checked before downloading, so media the model would ignore is never
    /// fetched.
    fn accepts_attachment(&self, mime_type: &str) -> bool {
        is_image_mime(mime_type) || is_pdf_mime(mime_type)
    }
}

/// Generate a reply, substituting `fallback` for any provider failure
pub async fn respond_or_fallback(
    responder: &dyn Responder,
    request: &ResponseRequest,
    fallback: &str,
) -> String {
    match responder.respond(request).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(
                provider = responder.name(),
                sender = %request.sender_id,
                error = %e,
                "response generation failed, using fallback"
            );
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Failing;

    #[async_trait]
    impl Responder for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn respond(&self, _request: &ResponseRequest) -> Result<String> {
            Err(Error::Agent("rate limited".to_string()))
        }
    }

    struct Echo;

    #[async_trait]
    impl Responder for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn respond(&self, request: &ResponseRequest) -> Result<String> {
            Ok(request.text.clone())
        }
    }

    #[tokio::test]
    async fn test_fallback_on_error() {
        let reply = respond_or_fallback(&Failing, &ResponseRequest::text("1", "hi"), FALLBACK_REPLY).await;
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_passes_through_success() {
        let reply = respond_or_fallback(&Echo, &ResponseRequest::text("1", "hi"), FALLBACK_REPLY).await;
        assert_eq!(reply, "hi");
    }

    #[test]
    fn test_attachment_kinds() {
        let attachment = |mime: &str| Attachment {
            mime_type: mime.to_string(),
            filename: None,
            data: vec![],
        };
        assert!(attachment("image/WEBP").is_image());
        assert!(attachment("application/pdf").is_pdf());
        assert!(!attachment("audio/ogg").is_image());
        assert!(!attachment("text/plain").is_pdf());
    }

    #[test]
    fn test_default_accepted_attachment_types() {
        assert!(Echo.accepts_attachment("image/jpeg"));
        assert!(Echo.accepts_attachment("application/PDF"));
        assert!(!Echo.accepts_attachment("application/zip"));
        assert!(!Echo.accepts_attachment("audio/ogg"));
    }
}
