use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ProviderError};
use crate::models::Vendor;

use super::types::ChatRequest;
use super::{api_error, build_http_client, transport_error, trim_base_url, ChatClient};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            client: build_http_client(timeout)?,
        })
    }
}

// Anthropic API request/response types

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    system: &'a str,
    temperature: f64,
    max_tokens: i32,
    metadata: AnthropicMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicMetadata<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

#[async_trait]
impl ChatClient for AnthropicClient {
    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
    }

    async fn send(&self, api_key: &str, request: &ChatRequest) -> Result<String, ProviderError> {
        let api_request = AnthropicRequest {
            model: &request.model,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
            system: &request.system,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            metadata: AnthropicMetadata {
                user_id: &request.session_tag,
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(api_error("Anthropic", status, &detail));
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))?;

        let content = api_response
            .content
            .iter()
            .filter_map(|c| match c {
                AnthropicResponseContent::Text { text } => Some(text.as_str()),
                AnthropicResponseContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(content)
    }
}
