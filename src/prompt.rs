//! Prompt text for the completion provider

use crate::channels::{ContactCard, InboundContent, Location};

/// System instructions used when `WACHAT_SYSTEM_PROMPT` is not set
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful WhatsApp assistant named WaChat Bot. \
Keep answers concise and friendly, suitable for a chat message. \
You can analyze images, documents, locations and contacts that users send you. \
Reply in the language the user writes in.";

/// Build the user turn for an inbound message
///
/// `media_unavailable` is set when the message carried media that could not
/// be downloaded; the model is told so it answers from the description alone.
#[must_use]
pub fn describe_inbound(content: &InboundContent, media_unavailable: bool) -> String {
    let mut text = match content {
        InboundContent::Text { body } => body.clone(),
        InboundContent::Image { caption, .. } => caption.as_ref().map_or_else(
            || "The user sent an image.".to_string(),
            |c| format!("The user sent an image with the message: {c}"),
        ),
        InboundContent::Audio { .. } => {
            "The user sent a voice/audio message. You cannot listen to it; \
             kindly ask them to write their question instead."
                .to_string()
        }
        InboundContent::Document {
            media,
            filename,
            caption,
        } => {
            let mut line = format!(
                "The user sent a document: {}, type: {}",
                filename.as_deref().unwrap_or("unnamed file"),
                media.mime_type.as_deref().unwrap_or("unknown"),
            );
            if let Some(caption) = caption {
                line.push_str(&format!(", description: {caption}"));
            }
            line
        }
        InboundContent::Location(location) => describe_location(location),
        InboundContent::Contacts(cards) => describe_contacts(cards),
        InboundContent::Sticker { animated, .. } => {
            if *animated {
                "The user sent an animated sticker (an expressive image).".to_string()
            } else {
                "The user sent a sticker (an expressive image).".to_string()
            }
        }
        InboundContent::Unsupported { kind } => {
            format!("The user sent a message of type: {kind}")
        }
    };

    if media_unavailable {
        text.push_str("\n\n(The attached file could not be retrieved; answer from the text above.)");
    }

    text
}

fn describe_location(location: &Location) -> String {
    let mut line = format!(
        "The user shared a location: latitude {}, longitude {}",
        location.latitude, location.longitude
    );
    if let Some(name) = &location.name {
        line.push_str(&format!(", place: {name}"));
    }
    if let Some(address) = &location.address {
        line.push_str(&format!(", address: {address}"));
    }
    line
}

fn describe_contacts(cards: &[ContactCard]) -> String {
    let names: Vec<&str> = cards
        .iter()
        .map(|c| c.formatted_name.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    let names = if names.is_empty() {
        "no names".to_string()
    } else {
        names.join(", ")
    };
    format!("The user shared {} contact(s): {names}", cards.len())
}
