use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ProviderError};
use crate::models::Vendor;

use super::types::ChatRequest;
use super::{api_error, build_http_client, transport_error, trim_base_url, ChatClient};

pub struct OpenAiClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            client: build_http_client(timeout)?,
        })
    }
}

// OpenAI API request/response types

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f64,
    max_tokens: i32,
    user: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn vendor(&self) -> Vendor {
        Vendor::OpenAi
    }

    async fn send(&self, api_key: &str, request: &ChatRequest) -> Result<String, ProviderError> {
        let api_request = OpenAiRequest {
            model: &request.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: &request.system,
                },
                OpenAiMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            user: &request.session_tag,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(api_error("OpenAI", status, &detail));
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {e}")))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Unexpected("No choices in response".to_string()))
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
            model: "gpt-4o-mini".to_string(),
            system: "You are terse.".to_string(),
            prompt: "Say hi".to_string(),
            session_tag: "raid-1".to_string(),
            temperature: 0.3,
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let reply = client.send("sk-test", &request()).await.unwrap();
        assert_eq!(reply, "hi");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_classified_as_invalid_key() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(json!({ "error": { "message": "Incorrect API key provided" } }).to_string())
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.send("sk-bad", &request()).await.unwrap_err();
        assert_eq!(err.status(), HealthStatus::InvalidKey);
    }

    #[tokio::test]
    async fn missing_model_is_classified_as_invalid_model() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(404)
            .with_body(json!({ "error": { "message": "The model does not exist" } }).to_string())
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.send("sk-test", &request()).await.unwrap_err();
        assert_eq!(err.status(), HealthStatus::InvalidModel);
    }

    #[tokio::test]
    async fn server_error_is_connection_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("upstream overloaded")
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.send("sk-test", &request()).await.unwrap_err();
        assert_eq!(err.status(), HealthStatus::ConnectionError);
    }
}
