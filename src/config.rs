use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::*;
use crate::error::AppError;
use crate::models::{AddProviderRequest, Vendor};

/// Process configuration, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub call_timeout: Duration,
    pub validate_on_startup: bool,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub gemini_base_url: String,
    /// Providers to seed the registry with, one per credential found.
    pub default_providers: Vec<AddProviderRequest>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("RAIDMASTER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse::<SocketAddr>().map_err(|e| {
            AppError::InvalidInput(format!("RAIDMASTER_BIND '{bind_raw}' is not an address: {e}"))
        })?;

        let call_timeout = match get("RAIDMASTER_CALL_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    AppError::InvalidInput(format!(
                        "RAIDMASTER_CALL_TIMEOUT_SECS '{raw}' is not a number: {e}"
                    ))
                })?;
                if secs == 0 {
                    return Err(AppError::InvalidInput(
                        "RAIDMASTER_CALL_TIMEOUT_SECS must be at least 1".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CALL_TIMEOUT,
        };

        let validate_on_startup = match get("RAIDMASTER_VALIDATE_ON_STARTUP") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "RAIDMASTER_VALIDATE_ON_STARTUP '{raw}' is not a boolean"
                ))
            })?,
            None => false,
        };

        let mut default_providers = Vec::new();
        if let Some(key) = get("OPENAI_API_KEY") {
            default_providers.push(seed(
                "OpenAI",
                Vendor::OpenAi,
                get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                key,
            ));
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            default_providers.push(seed(
                "Anthropic",
                Vendor::Anthropic,
                get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                key,
            ));
        }
        if let Some(key) = get("GOOGLE_AI_STUDIO_API_KEY").or_else(|| get("GEMINI_API_KEY")) {
            default_providers.push(seed(
                "Google Gemini",
                Vendor::Gemini,
                get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                key,
            ));
        }

        Ok(Self {
            bind,
            call_timeout,
            validate_on_startup,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            anthropic_base_url: get("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            default_providers,
        })
    }
}

fn seed(name: &str, provider: Vendor, model: String, api_key: String) -> AddProviderRequest {
    AddProviderRequest {
        id: None,
        name: name.to_string(),
        provider,
        model,
        api_key,
        enabled: true,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
