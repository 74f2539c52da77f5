//! OpenAI-compatible chat completions client

use super::{image_to_data_url, StructuredImageExtractor, TABLE_EXTRACTION_PROMPT};
use crate::config::ExtractorConfig;
use crate::error::{Error, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible vision model
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    jpeg_quality: u8,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Build a client; the API key comes from the config or `OPENAI_API_KEY`
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| {
                std::env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|key| !key.is_empty())
            })
            .ok_or_else(|| Error::ModelRequest {
                reason: "No API key configured (set api_key or OPENAI_API_KEY)".to_string(),
            })?;

        Self::with_api_key(
            api_key,
            &config.api_base_url,
            config.request_timeout,
            config.jpeg_quality,
        )
    }

    pub fn with_api_key(
        api_key: String,
        api_base_url: &str,
        timeout: Duration,
        jpeg_quality: u8,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ModelRequest {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            api_key,
            endpoint: chat_completions_url(api_base_url),
            jpeg_quality,
        })
    }
}

fn chat_completions_url(base: &str) -> String {
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

fn build_request<'a>(model: &'a str, image_url: String) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: TABLE_EXTRACTION_PROMPT,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url },
                },
            ],
        }],
        response_format: ResponseFormat {
            kind: "json_object",
        },
        temperature: 0.0,
    }
}

/// Pull the first choice's message content out of a response body.
///
/// The content is kept byte for byte; it is not parsed as JSON.
fn parse_response(body: &str) -> Result<serde_json::Value> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| Error::ModelRequest {
        reason: format!("Malformed model response: {}", e),
    })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::ModelRequest {
            reason: "Model response contained no message content".to_string(),
        })?;

    Ok(serde_json::Value::String(content))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

impl StructuredImageExtractor for OpenAiClient {
    fn extract_table_from_image(
        &self,
        image: &DynamicImage,
        model: &str,
    ) -> Result<serde_json::Value> {
        let image_url = image_to_data_url(image, self.jpeg_quality)?;
        let request = build_request(model, image_url);

        tracing::debug!(
            model,
            endpoint = %self.endpoint,
            width = image.width(),
            height = image.height(),
            "Sending table page to model"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| Error::ModelRequest {
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| Error::ModelRequest {
            reason: format!("Failed to read model response: {}", e),
        })?;

        if !status.is_success() {
            return Err(Error::ModelRequest {
                reason: format!("Model API returned {}: {}", status, truncate(&body)),
            });
        }

        parse_response(&body)
    }
}
