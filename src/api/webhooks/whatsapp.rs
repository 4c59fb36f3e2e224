//! `WhatsApp` Cloud API webhook handler
//!
//! Meta verifies the endpoint with a `GET` challenge, then delivers events
//! with `POST`. Every `POST` is answered 200, whatever happens downstream,
//! so Meta does not redeliver.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::api::ApiState;
use crate::channels::{WhatsAppWebhook, extract_message};

/// Subscription handshake parameters
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Webhook acknowledgement body
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

impl WebhookResponse {
    const fn ok() -> Json<Self> {
        Json(Self { status: "ok" })
    }
}

/// Answer the subscription handshake
///
/// Echoes `hub.challenge` as plain text when `hub.mode` is `subscribe` and
/// `hub.verify_token` matches the configured token; 403 otherwise, including
/// for a query string that does not decode (duplicated or malformed keys).
pub async fn verify_subscription(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<VerifyParams>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable webhook verification query");
            return forbidden();
        }
    };

    let expected = state.config.whatsapp.verify_token.expose_secret();

    let token_matches = params
        .verify_token
        .as_deref()
        .is_some_and(|t| !expected.is_empty() && t == expected);

    match (params.mode.as_deref(), params.challenge) {
        (Some("subscribe"), Some(challenge)) if token_matches => {
            tracing::info!("webhook verification succeeded");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                challenge,
            )
                .into_response()
        }
        (mode, _) => {
            tracing::warn!(mode = ?mode, token_matches, "webhook verification failed");
            forbidden()
        }
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Verification failed").into_response()
}

/// Handle an event delivery
///
/// The body is parsed by hand so malformed JSON is acknowledged rather than
/// rejected by an extractor.
pub async fn handle_event(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let payload: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "unparseable WhatsApp webhook body");
            return (StatusCode::OK, WebhookResponse::ok());
        }
    };

    let Some(inbound) = extract_message(&payload) else {
        tracing::debug!(object = ?payload.object, "webhook delivery without a message");
        return (StatusCode::OK, WebhookResponse::ok());
    };

    let outcome = state.relay.handle(&inbound).await;
    tracing::debug!(id = %inbound.id, outcome = ?outcome, "WhatsApp message handled");

    (StatusCode::OK, WebhookResponse::ok())
}
