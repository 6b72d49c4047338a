use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ProviderError};
use crate::models::Vendor;

use super::types::ChatRequest;
use super::{api_error, build_http_client, transport_error, trim_base_url, ChatClient};

pub struct GeminiClient {
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            client: build_http_client(timeout)?,
        })
    }
}

// --- Gemini API request types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// Only text parts matter here; anything else deserializes with `text: None`.
#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f64,
    max_output_tokens: i32,
}

// --- Gemini API response types ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn text_content(role: Option<&str>, text: &str) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart {
            text: Some(text.to_string()),
        }],
    }
}

#[async_trait]
impl ChatClient for GeminiClient {
    fn vendor(&self) -> Vendor {
        Vendor::Gemini
    }

    async fn send(&self, api_key: &str, request: &ChatRequest) -> Result<String, ProviderError> {
        let api_request = GeminiRequest {
            contents: vec![text_content(Some("user"), &request.prompt)],
            system_instruction: text_content(None, &request.system),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        tracing::debug!(session = %request.session_tag, model = %request.model, "calling gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(api_error("Gemini", status, &detail));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))?;

        let candidate = api_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::Unexpected("No candidates in response".to_string()))?;

        let content = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthStatus;
    use mockito::Server;
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gemini-1.5-flash".to_string(),
            system: "Be brief.".to_string(),
            prompt: "Ping".to_string(),
            session_tag: "raid-3".to_string(),
            temperature: 0.3,
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn returns_first_candidate_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_header("x-goog-api-key", "g-key")
            .with_status(200)
            .with_body(
                json!({
                    "candidates": [{
                        "content": { "role": "model", "parts": [{ "text": "pong" }] },
                        "finishReason": "STOP"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GeminiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let reply = client.send("g-key", &request()).await.unwrap();
        assert_eq!(reply, "pong");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_candidates_is_generic_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(200)
            .with_body(json!({ "candidates": [] }).to_string())
            .create_async()
            .await;

        let client = GeminiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.send("g-key", &request()).await.unwrap_err();
        assert_eq!(err.status(), HealthStatus::Error);
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        let client = GeminiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.send("g-key", &request()).await.unwrap_err();
        assert_eq!(err.status(), HealthStatus::ConnectionError);
    }
}
