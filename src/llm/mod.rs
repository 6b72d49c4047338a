pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::constants::HTTP_CONNECT_TIMEOUT;
use crate::error::{AppError, ProviderError};
use crate::models::Vendor;
use types::ChatRequest;

/// A vendor adapter. Credentials come with each call because many provider
/// entries may share one vendor.
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn vendor(&self) -> Vendor;
    async fn send(&self, api_key: &str, request: &ChatRequest) -> Result<String, ProviderError>;
}

pub struct ClientRegistry {
    clients: HashMap<Vendor, Box<dyn ChatClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// One HTTP adapter per supported vendor, pointed at the configured base URLs.
    pub fn with_http_clients(config: &Config) -> Result<Self, AppError> {
        let mut registry = Self::new();
        registry.register(Box::new(openai::OpenAiClient::new(
            &config.openai_base_url,
            config.call_timeout,
        )?));
        registry.register(Box::new(anthropic::AnthropicClient::new(
            &config.anthropic_base_url,
            config.call_timeout,
        )?));
        registry.register(Box::new(gemini::GeminiClient::new(
            &config.gemini_base_url,
            config.call_timeout,
        )?));
        Ok(registry)
    }

    pub fn register(&mut self, client: Box<dyn ChatClient>) {
        self.clients.insert(client.vendor(), client);
    }

    pub fn get(&self, vendor: Vendor) -> Option<&dyn ChatClient> {
        self.clients.get(&vendor).map(|c| c.as_ref())
    }

    pub async fn send(
        &self,
        vendor: Vendor,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<String, ProviderError> {
        match self.get(vendor) {
            Some(client) => client.send(api_key, request).await,
            None => Err(ProviderError::Unexpected(format!(
                "No client registered for vendor '{vendor}'"
            ))),
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Transport failures are classified without the URL, which for some vendors
/// contains the word "models" and would skew the heuristic.
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    let err = err.without_url();
    if err.is_timeout() {
        return ProviderError::Connection(format!("Request timed out: {err}"));
    }
    ProviderError::classify(format!("Request failed: {err}"))
}

pub(crate) fn api_error(vendor_label: &str, status: reqwest::StatusCode, detail: &str) -> ProviderError {
    ProviderError::classify(format!("{vendor_label} API error ({status}): {detail}"))
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
