//! `WaChat` Gateway - `WhatsApp` Cloud API relay for an `OpenAI` assistant
//!
//! Receives `WhatsApp` webhook events, asks the completion provider for an
//! answer (with the attached image or PDF and, optionally, a knowledge-base
//! search) and sends the answer back to the same chat.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │             HTTP surface (axum)                      │
//! │   /webhook  │  /  │  /health  │  /test-*             │
//! └────────────────────┬─────────────────────────────────┘
//!                      │ InboundMessage
//! ┌────────────────────▼─────────────────────────────────┐
//! │                    Relay                             │
//! │   fetch media  →  Responder  →  compose reply        │
//! └──────────┬───────────────────────────┬───────────────┘
//!            │                           │
//! ┌──────────▼──────────┐     ┌──────────▼───────────────┐
//! │ WhatsApp Cloud API  │     │ OpenAI Responses API     │
//! │ media + messages    │     │ vision + file_search     │
//! └─────────────────────┘     └──────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod prompt;
pub mod relay;

pub use agent::{FALLBACK_REPLY, OpenAiResponder, Responder, ResponseRequest};
pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use channels::{Channel, InboundContent, InboundMessage, OutgoingMessage, WhatsAppChannel};
pub use config::Config;
pub use error::{Error, Result};
pub use relay::{Relay, RelayOutcome};
