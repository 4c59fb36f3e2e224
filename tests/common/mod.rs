//! Shared test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;
use wachat_gateway::{
    ApiServerBuilder, Config, Error, Responder, ResponseRequest,
    channels::{Channel, FetchedMedia, OutgoingMessage},
};

pub const VERIFY_TOKEN: &str = "verify-secret";
pub const SENDER: &str = "15551234567";

/// Ordered record of calls across mocks
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Build a config from the required values plus overrides
#[must_use]
pub fn config_with(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("VERIFY_TOKEN", VERIFY_TOKEN),
        ("WHATSAPP_TOKEN", "wa-token"),
        ("PHONE_NUMBER_ID", "123456"),
        ("OPENAI_API_KEY", "sk-test"),
    ]
    .iter()
    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert((*k).to_string(), (*v).to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

/// Default test configuration
#[must_use]
pub fn test_config() -> Config {
    config_with(&[])
}

/// Mock channel recording sends and media lookups
pub struct MockChannel {
    events: EventLog,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub fail_media: bool,
    pub fail_send: bool,
}

impl MockChannel {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            sent: Mutex::new(Vec::new()),
            fail_media: false,
            fail_send: false,
        }
    }

    pub async fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, message: OutgoingMessage) -> wachat_gateway::Result<()> {
        self.events.lock().await.push(format!("send:{}", message.kind()));
        if self.fail_send {
            return Err(Error::Channel("send refused".to_string()));
        }
        self.sent.lock().await.push(message);
        Ok(())
    }

    async fn fetch_media(&self, media_id: &str) -> wachat_gateway::Result<FetchedMedia> {
        self.events.lock().await.push(format!("fetch:{media_id}"));
        if self.fail_media {
            return Err(Error::Media("download failed".to_string()));
        }
        Ok(FetchedMedia {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0xFF],
        })
    }
}

/// Mock responder returning a fixed reply, or failing when `reply` is `None`
pub struct MockResponder {
    events: EventLog,
    reply: Option<String>,
    pub requests: Mutex<Vec<ResponseRequest>>,
}

impl MockResponder {
    pub fn new(events: EventLog, reply: Option<&str>) -> Self {
        Self {
            events,
            reply: reply.map(ToString::to_string),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn received(&self) -> Vec<ResponseRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Responder for MockResponder {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn respond(&self, request: &ResponseRequest) -> wachat_gateway::Result<String> {
        self.events.lock().await.push("respond".to_string());
        self.requests.lock().await.push(request.clone());
        self.reply
            .clone()
            .ok_or_else(|| Error::Agent("provider unavailable".to_string()))
    }
}

/// Router wired to mocks
pub struct Harness {
    pub router: Router,
    pub channel: Arc<MockChannel>,
    pub responder: Arc<MockResponder>,
    pub events: EventLog,
}

impl Harness {
    pub async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}

/// Build a harness; `configure` adjusts the mock channel before wiring
pub fn harness_with(
    config: Config,
    reply: Option<&str>,
    configure: impl FnOnce(&mut MockChannel),
) -> Harness {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let mut channel = MockChannel::new(events.clone());
    configure(&mut channel);
    let channel = Arc::new(channel);
    let responder = Arc::new(MockResponder::new(events.clone(), reply));

    let server = ApiServerBuilder::new(config)
        .channel(channel.clone())
        .responder(responder.clone())
        .build()
        .expect("server builds");

    Harness {
        router: server.router(),
        channel,
        responder,
        events,
    }
}

/// Harness with default config and a working channel
pub fn harness(reply: Option<&str>) -> Harness {
    harness_with(test_config(), reply, |_| {})
}

/// Run one request against a router, returning status and body bytes
pub async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    (status, body.to_vec())
}

/// `POST` a JSON body
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// `GET` a URI
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

/// Wrap a message object in a Cloud API webhook envelope
#[must_use]
pub fn webhook(message: &Value) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": { "display_phone_number": "15550000000", "phone_number_id": "123456" },
                    "contacts": [{ "wa_id": SENDER, "profile": { "name": "Ana" } }],
                    "messages": [message]
                }
            }]
        }]
    })
}

/// Webhook carrying a text message
#[must_use]
pub fn text_webhook(body: &str) -> Value {
    webhook(&json!({
        "from": SENDER,
        "id": "wamid.text",
        "timestamp": "1700000000",
        "type": "text",
        "text": { "body": body }
    }))
}

/// Webhook carrying an image message
#[must_use]
pub fn image_webhook(media_id: &str) -> Value {
    webhook(&json!({
        "from": SENDER,
        "id": "wamid.image",
        "timestamp": "1700000000",
        "type": "image",
        "image": { "id": media_id, "mime_type": "image/jpeg" }
    }))
}
