//! Manual trigger endpoints
//!
//! `POST /test-whatsapp` sends a message straight through the channel and
//! `POST /test-file-search` asks the responder a question against the
//! knowledge base. Both bypass the webhook and report failures to the caller.
//!
//! `/test-whatsapp` takes either a JSON body or, with an empty body,
//! `?phone_number=..&message=..` query parameters.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::{ApiState, auth};
use crate::agent::ResponseRequest;
use crate::channels::{ContactCard, Location, MediaKind, OutgoingBody, OutgoingMessage};

/// Text used when `/test-whatsapp` is called without a message
pub const DEFAULT_TEST_MESSAGE: &str = "Test message";

/// Media reference for a test send
#[derive(Debug, Deserialize)]
pub struct TestMedia {
    pub kind: MediaKind,
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// `POST /test-whatsapp` body
///
/// The first of `media`, `location` and `contacts` that is present decides
/// the message shape; with none of them a text message is sent.
#[derive(Debug, Deserialize)]
pub struct TestMessageRequest {
    pub phone_number: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub media: Option<TestMedia>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub contacts: Option<Vec<ContactCard>>,
}

/// `POST /test-whatsapp` query parameters, used when the body is empty
#[derive(Debug, Default, Deserialize)]
pub struct TestMessageQuery {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TestMessageQuery {
    fn into_request(self) -> Option<TestMessageRequest> {
        Some(TestMessageRequest {
            phone_number: self.phone_number.filter(|p| !p.trim().is_empty())?,
            message: self.message,
            media: None,
            location: None,
            contacts: None,
        })
    }
}

/// `POST /test-whatsapp` response
#[derive(Debug, Serialize)]
pub struct TestMessageResponse {
    pub success: bool,
    pub phone_number: String,
    pub message: String,
    pub kind: &'static str,
    pub whatsapp_api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /test-file-search` body
#[derive(Debug, Deserialize)]
pub struct FileSearchRequest {
    pub query: String,
    /// Also deliver the answer to this number
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// `POST /test-file-search` response
#[derive(Debug, Default, Serialize)]
pub struct FileSearchResponse {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reject a manual request that names no recipient or does not parse
fn bad_request(error: String) -> Response {
    tracing::warn!(error = %error, "rejected manual test request");
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "success": false, "error": error })),
    )
        .into_response()
}

/// Send a message directly through the channel
async fn test_whatsapp(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<TestMessageQuery>,
    body: Bytes,
) -> Response {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        match query.into_request() {
            Some(req) => req,
            None => return bad_request("phone_number is required".to_string()),
        }
    } else {
        match serde_json::from_slice::<TestMessageRequest>(&body) {
            Ok(req) => req,
            Err(e) => return bad_request(format!("invalid request body: {e}")),
        }
    };

    send_test_message(&state, req).await.into_response()
}

async fn send_test_message(
    state: &ApiState,
    req: TestMessageRequest,
) -> (StatusCode, Json<TestMessageResponse>) {
    let text = req
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_MESSAGE.to_string());

    let body = if let Some(media) = req.media {
        OutgoingBody::Media {
            kind: media.kind,
            media_id: media.id,
            caption: media.caption.or_else(|| Some(text.clone())),
        }
    } else if let Some(location) = req.location {
        OutgoingBody::Location(location)
    } else if let Some(contacts) = req.contacts {
        OutgoingBody::Contacts(contacts)
    } else {
        OutgoingBody::Text(text.clone())
    };

    let message = OutgoingMessage {
        recipient_id: req.phone_number.clone(),
        body,
    };
    let kind = message.kind();

    tracing::info!(to = %req.phone_number, kind, "manual test send");
    let result = state.channel.send(message).await;

    let (status, error) = match result {
        Ok(()) => (StatusCode::OK, None),
        Err(e) => {
            tracing::error!(to = %req.phone_number, error = %e, "manual test send failed");
            (StatusCode::BAD_GATEWAY, Some(e.to_string()))
        }
    };

    (
        status,
        Json(TestMessageResponse {
            success: error.is_none(),
            phone_number: req.phone_number,
            message: text,
            kind,
            whatsapp_api_url: state.config.whatsapp.messages_url(),
            error,
        }),
    )
}

/// Ask the responder a question with document search enabled
async fn test_file_search(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<FileSearchRequest>,
) -> (StatusCode, Json<FileSearchResponse>) {
    let Some(knowledge_base_id) = state.config.openai.vector_store_id.clone() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(FileSearchResponse {
                query: req.query,
                error: Some("no knowledge base configured (OPENAI_VECTOR_STORE_ID)".to_string()),
                ..FileSearchResponse::default()
            }),
        );
    };

    let sender_id = req
        .phone_number
        .clone()
        .unwrap_or_else(|| "manual-test".to_string());
    let request = ResponseRequest {
        file_search: true,
        ..ResponseRequest::text(sender_id, req.query.clone())
    };

    let answer = match state.responder.respond(&request).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::error!(error = %e, "manual file search failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(FileSearchResponse {
                    query: req.query,
                    knowledge_base_id: Some(knowledge_base_id),
                    error: Some(e.to_string()),
                    ..FileSearchResponse::default()
                }),
            );
        }
    };

    let sent = match req.phone_number {
        Some(to) => {
            let result = state
                .channel
                .send(OutgoingMessage::text(to.clone(), answer.clone()))
                .await;
            if let Err(e) = &result {
                tracing::error!(to = %to, error = %e, "failed to deliver file search answer");
            }
            Some(result.is_ok())
        }
        None => None,
    };

    (
        StatusCode::OK,
        Json(FileSearchResponse {
            success: true,
            query: req.query,
            answer: Some(answer),
            knowledge_base_id: Some(knowledge_base_id),
            sent,
            error: None,
        }),
    )
}

/// Build manual endpoints router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/test-whatsapp", post(test_whatsapp))
        .route("/test-file-search", post(test_file_search))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .with_state(state)
}
