use std::time::Duration;

pub const SERVICE_NAME: &str = "RAIDMASTER AI API";

// Concurrency limits
pub const MAX_MULTI_PROVIDERS: usize = 3;
pub const BATCH_CONCURRENCY: usize = 3;

pub const DEFAULT_BIND: &str = "0.0.0.0:8001";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Canary
pub const CANARY_PROMPT: &str = "Hello, please respond with exactly 'API connection successful'";
pub const CANARY_REPLY: &str = "API connection successful";
pub const CANARY_SYSTEM: &str = "You are a connectivity check. Follow the instruction exactly.";

// Flag codes
pub const FLAG_PROVIDER_ERROR: &str = "PROVIDER_ERROR";
pub const FLAG_PARSE_ERROR: &str = "PARSE_ERROR";

// Parser defaults
pub const DEFAULT_ANALYSIS_TEXT: &str = "Analysis completed";
pub const DEFAULT_CONFIDENCE: f64 = 0.75;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;
pub const FALLBACK_EXCERPT_CHARS: usize = 200;

// Generation settings shared by all vendors
pub const TEMPERATURE: f64 = 0.3;
pub const MAX_TOKENS: i32 = 1024;

// Default models for seeded credentials
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

// Item store
pub const RECENT_ACTIVITY_DAYS: i64 = 7;
