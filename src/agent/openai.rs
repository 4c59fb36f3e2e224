//! `OpenAI` Responses API client
//!
//! One `POST /responses` per reply. Images are sent as `input_image` data
//! URLs, PDFs as `input_file`, and the `file_search` tool is attached when a
//! vector store is configured and the request asks for it.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{Attachment, Responder, ResponseRequest};
use crate::config::OpenAiConfig;
use crate::{Error, Result};

/// `OpenAI` responder
pub struct OpenAiResponder {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    instructions: String,
    vector_store_id: Option<String>,
}

/// Responses API request
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<InputMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool<'a>>,
}

/// A conversation turn in the request
#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: Vec<InputContent<'a>>,
}

/// Content part (text, image or file)
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum InputContent<'a> {
    #[serde(rename = "input_text")]
    Text { text: &'a str },
    #[serde(rename = "input_image")]
    Image { image_url: String },
    #[serde(rename = "input_file")]
    File { filename: &'a str, file_data: String },
}

/// Hosted tool definition
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Tool<'a> {
    #[serde(rename = "file_search")]
    FileSearch { vector_store_ids: Vec<&'a str> },
}

/// Responses API response
#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

/// Output item; only messages carry text
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputItem {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputContent {
    #[serde(rename = "output_text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl OpenAiResponder {
    /// Create a new responder
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required".to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            instructions: config.instructions.clone(),
            vector_store_id: config.vector_store_id.clone(),
        })
    }

    fn build_request<'a>(&'a self, request: &'a ResponseRequest) -> ResponsesRequest<'a> {
        let mut content = vec![InputContent::Text {
            text: &request.text,
        }];

        if let Some(attachment) = &request.attachment {
            if let Some(part) = attachment_part(attachment) {
                content.push(part);
            } else {
                tracing::debug!(
                    mime = %attachment.mime_type,
                    "attachment type not accepted by the model, sending text only"
                );
            }
        }

        let tools = match (request.file_search, self.vector_store_id.as_deref()) {
            (true, Some(id)) => vec![Tool::FileSearch {
                vector_store_ids: vec![id],
            }],
            _ => Vec::new(),
        };

        ResponsesRequest {
            model: &self.model,
            instructions: &self.instructions,
            input: vec![InputMessage {
                role: "user",
                content,
            }],
            tools,
        }
    }
}

fn attachment_part(attachment: &Attachment) -> Option<InputContent<'_>> {
    if attachment.is_image() {
        Some(InputContent::Image {
            image_url: data_url(&attachment.mime_type, &attachment.data),
        })
    } else if attachment.is_pdf() {
        Some(InputContent::File {
            filename: attachment.filename.as_deref().unwrap_or("document.pdf"),
            file_data: data_url(&attachment.mime_type, &attachment.data),
        })
    } else {
        None
    }
}

fn data_url(mime_type: &str, data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{mime_type};base64,{encoded}")
}

#[async_trait]
impl Responder for OpenAiResponder {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn respond(&self, request: &ResponseRequest) -> Result<String> {
        let body = self.build_request(request);

        tracing::debug!(
            model = %self.model,
            sender = %request.sender_id,
            has_attachment = request.attachment.is_some(),
            file_search = !body.tools.is_empty(),
            "requesting OpenAI response"
        );

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Agent(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Agent(format!("OpenAI API error {status}: {body}")));
        }

        let result: ResponsesResponse = response
            .json()
            .await
            .map_err(|e| Error::Agent(format!("invalid response: {e}")))?;

        let text = result
            .output
            .into_iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                OutputItem::Other => None,
            })
            .flatten()
            .find_map(|part| match part {
                OutputContent::Text { text } if !text.trim().is_empty() => Some(text),
                _ => None,
            })
            .ok_or_else(|| Error::Agent("no text in response".to_string()))?;

        tracing::info!(sender = %request.sender_id, chars = text.len(), "OpenAI response received");

        Ok(text.trim().to_string())
    }
}
