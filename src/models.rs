use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Provider Models ---

/// Vendor tag selecting which client adapter talks to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    OpenAi,
    Anthropic,
    Gemini,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Active,
    InvalidKey,
    InvalidModel,
    ConnectionError,
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Active => "active",
            HealthStatus::InvalidKey => "invalid_key",
            HealthStatus::InvalidModel => "invalid_model",
            HealthStatus::ConnectionError => "connection_error",
            HealthStatus::Error => "error",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub provider: Vendor,
    pub model: String,
    pub api_key: String,
    pub enabled: bool,
    pub status: HealthStatus,
    pub last_validated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderConfig {
    /// `name (model)`, the label attached to results this provider produced.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.model)
    }

    /// Enabled and last validated successfully.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.status == HealthStatus::Active
    }

    pub fn masked_key(&self) -> String {
        mask_key(&self.api_key)
    }

    /// Same vendor, model and credential: a health verdict for one applies
    /// to the other.
    pub fn same_pairing(&self, other: &ProviderConfig) -> bool {
        self.provider == other.provider && self.model == other.model && self.api_key == other.api_key
    }
}

pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// What the outside world sees of a provider. The credential never leaves
/// the registry unmasked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderView {
    pub id: String,
    pub name: String,
    pub provider: Vendor,
    pub model: String,
    pub api_key_masked: String,
    pub enabled: bool,
    pub status: HealthStatus,
    pub last_validated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProviderConfig> for ProviderView {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            provider: config.provider,
            model: config.model.clone(),
            api_key_masked: config.masked_key(),
            enabled: config.enabled,
            status: config.status,
            last_validated: config.last_validated,
            created_at: config.created_at,
            updated_at: config.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderView>,
    pub total: usize,
    pub active: usize,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddProviderRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub provider: Vendor,
    pub model: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Partial patch. Identity, creation time and health are not patchable, so
/// unknown fields such as `id` or `status` are simply ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProviderRequest {
    pub name: Option<String>,
    pub provider: Option<Vendor>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateAllRequest {
    pub enabled_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<BTreeMap<String, String>>,
}

// --- RAID Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Risk,
    Assumption,
    Issue,
    Dependency,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Risk,
        ItemType::Assumption,
        ItemType::Issue,
        ItemType::Dependency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Risk => "Risk",
            ItemType::Assumption => "Assumption",
            ItemType::Issue => "Issue",
            ItemType::Dependency => "Dependency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Proposed,
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Mitigating,
    Resolved,
    Closed,
    Archived,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 7] = [
        ItemStatus::Proposed,
        ItemStatus::Open,
        ItemStatus::InProgress,
        ItemStatus::Mitigating,
        ItemStatus::Resolved,
        ItemStatus::Closed,
        ItemStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Proposed => "Proposed",
            ItemStatus::Open => "Open",
            ItemStatus::InProgress => "In Progress",
            ItemStatus::Mitigating => "Mitigating",
            ItemStatus::Resolved => "Resolved",
            ItemStatus::Closed => "Closed",
            ItemStatus::Archived => "Archived",
        }
    }

    /// Case-insensitive lookup of the wire name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ItemStatus::Resolved | ItemStatus::Closed | ItemStatus::Archived
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::P0, Priority::P1, Priority::P2, Priority::P3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
    Critical,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Low => "Low",
            Impact::Medium => "Medium",
            Impact::High => "High",
            Impact::Critical => "Critical",
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            Impact::Low => 1,
            Impact::Medium => 2,
            Impact::High => 3,
            Impact::Critical => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

impl Likelihood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Likelihood::Low => "Low",
            Likelihood::Medium => "Medium",
            Likelihood::High => "High",
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            Likelihood::Low => 1,
            Likelihood::Medium => 2,
            Likelihood::High => 3,
        }
    }
}

/// The item as submitted for analysis. Never mutated by the analysis core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub status: ItemStatus,
    pub priority: Priority,
    pub impact: Impact,
    pub likelihood: Likelihood,
    pub workstream: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Analysis,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    Low,
    Medium,
    High,
}

impl FlagSeverity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(FlagSeverity::Low),
            "medium" => Some(FlagSeverity::Medium),
            "high" => Some(FlagSeverity::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFlag {
    pub code: String,
    pub message: String,
    pub severity: FlagSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AnalysisFlag {
    pub fn new(code: &str, message: impl Into<String>, severity: FlagSeverity) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity,
            field: None,
        }
    }
}

/// Structured analysis. A confidence of 0.0 means the analysis did not
/// happen; flags say why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analysis: String,
    pub suggested_priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_status: Option<ItemStatus>,
    pub confidence: f64,
    #[serde(default)]
    pub flags: Vec<AnalysisFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    /// Seconds spent waiting on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consensus {
    pub average_confidence: f64,
    pub suggested_priority: Option<Priority>,
    pub providers_succeeded: usize,
    pub providers_failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiProviderAnalysis {
    pub results: Vec<AnalysisResult>,
    pub failed: Vec<AnalysisResult>,
    pub consensus: Consensus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub item_id: Option<String>,
    pub item_title: String,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub providers_count: usize,
    pub active_providers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfigSummary {
    pub provider: Option<Vendor>,
    pub model: Option<String>,
    pub available: bool,
}

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub item: RaidItem,
    #[serde(default)]
    pub analysis_type: AnalysisMode,
    #[serde(default)]
    pub provider_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAnalyzeRequest {
    pub item: RaidItem,
    #[serde(default)]
    pub analysis_type: AnalysisMode,
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalyzeRequest {
    pub items: Vec<RaidItem>,
    #[serde(default)]
    pub analysis_type: AnalysisMode,
}

#[derive(Debug, Serialize)]
pub struct BatchAnalyzeResponse {
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItemAnalyzeRequest {
    #[serde(default)]
    pub analysis_type: AnalysisMode,
    #[serde(default)]
    pub provider_id: Option<String>,
}

// --- Item Store Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub status: ItemStatus,
    pub priority: Priority,
    pub impact: Impact,
    pub likelihood: Likelihood,
    pub severity_score: u32,
    pub workstream: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<AnalysisResult>,
}

impl TrackedItem {
    /// Borrowed copy handed to the analysis core.
    pub fn to_raid_item(&self) -> RaidItem {
        RaidItem {
            id: Some(self.id.clone()),
            item_type: self.item_type,
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            impact: self.impact,
            likelihood: self.likelihood,
            workstream: self.workstream.clone(),
            owner: self.owner.clone(),
            due_date: self.due_date.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ItemStatus>,
    pub priority: Option<Priority>,
    pub impact: Option<Impact>,
    pub likelihood: Option<Likelihood>,
    pub workstream: Option<String>,
    pub owner: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub recent_activity: usize,
    pub overdue: usize,
    pub active_items: usize,
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<TrackedItem>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ItemMessageResponse {
    pub message: String,
    pub item: TrackedItem,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_key_keeps_edges() {
        assert_eq!(mask_key("sk-abcdefghijkl"), "sk-a...ijkl");
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("12345678"), "****");
    }

    #[test]
    fn vendor_and_status_wire_names() {
        assert_eq!(serde_json::to_string(&Vendor::OpenAi).unwrap(), "\"openai\"");
        assert_eq!(
            serde_json::to_string(&HealthStatus::ConnectionError).unwrap(),
            "\"connection_error\""
        );
        let v: Vendor = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(v, Vendor::Gemini);
    }

    #[test]
    fn raid_item_accepts_camel_case_payload() {
        let item: RaidItem = serde_json::from_value(serde_json::json!({
            "id": "1",
            "type": "Risk",
            "title": "Vendor delay",
            "description": "Hardware may ship late",
            "status": "In Progress",
            "priority": "P1",
            "impact": "High",
            "likelihood": "Medium",
            "workstream": "infra",
            "owner": "ops",
            "dueDate": "2026-01-31"
        }))
        .unwrap();
        assert_eq!(item.status, ItemStatus::InProgress);
        assert_eq!(item.due_date.as_deref(), Some("2026-01-31"));
    }

    #[test]
    fn status_and_priority_parse_ignore_case() {
        assert_eq!(ItemStatus::parse("in progress"), Some(ItemStatus::InProgress));
        assert_eq!(Priority::parse(" p0 "), Some(Priority::P0));
        assert_eq!(Priority::parse("P7"), None);
    }
}
