use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::constants::*;
use crate::error::{AppError, ProviderError};
use crate::event_bus::{AnalysisEvent, EventBus, ProviderHealth};
use crate::llm::types::ChatRequest;
use crate::llm::ClientRegistry;
use crate::models::{
    AiConfigSummary, AnalysisFlag, AnalysisMode, AnalysisResult, BatchItemResult, Consensus,
    FlagSeverity, HealthStatus, HealthSummary, MultiProviderAnalysis, Priority, ProviderConfig,
    RaidItem, ValidationResult,
};
use crate::services::prompt_builder::{build_prompt, session_tag};
use crate::services::provider_registry::{HealthStamp, ProviderRegistry};
use crate::services::response_parser::parse_response;

/// Drives every provider call: validation, single and multi-provider
/// analysis, and batches. Provider failures are turned into flagged results
/// here; only `NotFound` and `NoProviderAvailable` reach the caller.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    clients: Arc<ClientRegistry>,
    event_bus: EventBus,
    call_timeout: Duration,
}

enum Outcome {
    Succeeded(AnalysisResult),
    Failed(AnalysisResult),
}

impl Outcome {
    fn into_result(self) -> AnalysisResult {
        match self {
            Outcome::Succeeded(result) | Outcome::Failed(result) => result,
        }
    }
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        clients: Arc<ClientRegistry>,
        event_bus: EventBus,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            clients,
            event_bus,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// One bounded upstream call. A timeout is just another classified failure.
    async fn call(
        &self,
        config: &ProviderConfig,
        request: &ChatRequest,
    ) -> (Result<String, ProviderError>, f64) {
        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.call_timeout,
            self.clients.send(config.provider, &config.api_key, request),
        )
        .await;
        let elapsed = start.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(ProviderError::classify(format!(
                "Request timed out after {:.1}s",
                self.call_timeout.as_secs_f64()
            ))),
        };
        (result, elapsed)
    }

    // --- Validation ---

    pub async fn validate(&self, id: &str) -> Result<ValidationResult, AppError> {
        let config = self.registry.get(id).await?;
        Ok(self.validate_config(&config).await)
    }

    /// Send the canary prompt and record the resulting health. Every call
    /// starts fresh: the previous status is overwritten either way.
    pub async fn validate_config(&self, config: &ProviderConfig) -> ValidationResult {
        let request = ChatRequest {
            model: config.model.clone(),
            system: CANARY_SYSTEM.to_string(),
            prompt: CANARY_PROMPT.to_string(),
            session_tag: format!("validate-{}", config.id),
            temperature: 0.0,
            max_tokens: 20,
        };

        let (outcome, elapsed) = self.call(config, &request).await;
        let (result, stamp) = match outcome {
            Ok(reply) if canary_answered(&reply) => (
                ValidationResult {
                    valid: true,
                    status: HealthStatus::Active,
                    message: "API key validated successfully".to_string(),
                    response_time: Some(elapsed),
                    model_info: Some(model_info(config)),
                },
                HealthStamp::Validated(Utc::now()),
            ),
            Ok(reply) => {
                let excerpt: String = reply.chars().take(100).collect();
                (
                    ValidationResult {
                        valid: false,
                        status: HealthStatus::Error,
                        message: format!("Unexpected response from provider: {excerpt}"),
                        response_time: Some(elapsed),
                        model_info: None,
                    },
                    HealthStamp::Cleared,
                )
            }
            Err(err) => (
                ValidationResult {
                    valid: false,
                    status: err.status(),
                    message: format!("{}: {}", err.summary(), err.message()),
                    response_time: None,
                    model_info: None,
                },
                HealthStamp::Cleared,
            ),
        };

        match self.registry.record_health(config, result.status, stamp).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!(provider_id = %config.id, "provider re-paired during validation; verdict discarded");
            }
            Err(err) => {
                // Removed while the canary was in flight.
                tracing::warn!(provider_id = %config.id, error = %err, "validated provider no longer registered");
            }
        }

        tracing::info!(
            provider_id = %config.id,
            vendor = %config.provider,
            model = %config.model,
            status = %result.status,
            "provider validated"
        );
        self.event_bus.publish(AnalysisEvent::ProviderValidated {
            provider_id: config.id.clone(),
            valid: result.valid,
            status: result.status,
            message: result.message.clone(),
        });
        result
    }

    /// Start validating every (enabled) provider in the background and return
    /// how many were queued. Results arrive via the registry and event bus.
    pub async fn validate_all(&self, enabled_only: bool) -> usize {
        let targets: Vec<ProviderConfig> = self
            .registry
            .list()
            .await
            .into_iter()
            .filter(|p| !enabled_only || p.enabled)
            .collect();
        let count = targets.len();

        let this = self.clone();
        tokio::spawn(async move {
            let results = join_all(targets.iter().map(|c| this.validate_config(c))).await;
            let active = results.iter().filter(|r| r.valid).count();
            tracing::info!(validated = results.len(), active, "batch validation finished");
        });

        count
    }

    // --- Analysis ---

    /// First enabled provider whose last validation succeeded, in registry
    /// order.
    pub async fn best_provider(&self) -> Option<ProviderConfig> {
        self.registry
            .list()
            .await
            .into_iter()
            .find(ProviderConfig::is_usable)
    }

    /// Never fails: provider errors come back as a zero-confidence result.
    pub async fn analyze_one(
        &self,
        item: &RaidItem,
        config: &ProviderConfig,
        mode: AnalysisMode,
    ) -> AnalysisResult {
        self.attempt(item, config, mode).await.into_result()
    }

    async fn attempt(&self, item: &RaidItem, config: &ProviderConfig, mode: AnalysisMode) -> Outcome {
        let prompt = build_prompt(item, mode);
        let request = ChatRequest {
            model: config.model.clone(),
            system: prompt.system,
            prompt: prompt.user,
            session_tag: session_tag(item),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let (outcome, elapsed) = self.call(config, &request).await;
        match outcome {
            Ok(reply) => {
                let mut result = parse_response(&reply);
                result.provider_used = Some(config.label());
                result.response_time = Some(elapsed);

                tracing::debug!(
                    provider_id = %config.id,
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    confidence = result.confidence,
                    "analysis completed"
                );
                self.event_bus.publish(AnalysisEvent::AnalysisCompleted {
                    provider_id: config.id.clone(),
                    item_title: item.title.clone(),
                    suggested_priority: result.suggested_priority,
                    confidence: result.confidence,
                    response_time: elapsed,
                });
                Outcome::Succeeded(result)
            }
            Err(err) => {
                tracing::warn!(
                    provider_id = %config.id,
                    vendor = %config.provider,
                    status = %err.status(),
                    error = %err,
                    "analysis call failed"
                );
                self.demote(config, err.status()).await;
                self.event_bus.publish(AnalysisEvent::AnalysisFailed {
                    provider_id: config.id.clone(),
                    item_title: item.title.clone(),
                    error: err.to_string(),
                });
                Outcome::Failed(provider_failure(item, config, &err, elapsed))
            }
        }
    }

    async fn demote(&self, config: &ProviderConfig, status: HealthStatus) {
        if config.status == status {
            return;
        }
        if let Ok(Some(_)) = self
            .registry
            .record_health(config, status, HealthStamp::Keep)
            .await
        {
            self.event_bus.publish(AnalysisEvent::ProviderHealthChanged {
                provider_id: config.id.clone(),
                status,
            });
        }
    }

    /// Analyze with an explicit provider, or with `best_provider()` when none
    /// is named.
    pub async fn analyze(
        &self,
        item: &RaidItem,
        mode: AnalysisMode,
        provider_id: Option<&str>,
    ) -> Result<AnalysisResult, AppError> {
        let config = self.resolve(provider_id).await?;
        Ok(self.analyze_one(item, &config, mode).await)
    }

    async fn resolve(&self, provider_id: Option<&str>) -> Result<ProviderConfig, AppError> {
        match provider_id.filter(|id| !id.is_empty()) {
            Some(id) => self.registry.get(id).await,
            None => self
                .best_provider()
                .await
                .ok_or(AppError::NoProviderAvailable),
        }
    }

    /// Fan one item out to up to three providers at once. One provider
    /// failing never affects the others.
    pub async fn analyze_multi(
        &self,
        item: &RaidItem,
        mode: AnalysisMode,
        provider_ids: Option<&[String]>,
    ) -> Result<MultiProviderAnalysis, AppError> {
        let selected = match provider_ids.filter(|ids| !ids.is_empty()) {
            Some(ids) => {
                let mut selected: Vec<ProviderConfig> = Vec::new();
                for id in ids {
                    if selected.iter().any(|p| &p.id == id) {
                        continue;
                    }
                    selected.push(self.registry.get(id).await?);
                    if selected.len() == MAX_MULTI_PROVIDERS {
                        break;
                    }
                }
                selected
            }
            None => self
                .registry
                .list()
                .await
                .into_iter()
                .filter(ProviderConfig::is_usable)
                .take(MAX_MULTI_PROVIDERS)
                .collect(),
        };

        if selected.is_empty() {
            return Err(AppError::NoProviderAvailable);
        }

        let outcomes = join_all(selected.iter().map(|c| self.attempt(item, c, mode))).await;

        let mut results = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Succeeded(result) => results.push(result),
                Outcome::Failed(result) => failed.push(result),
            }
        }

        let consensus = consensus(&results, failed.len());
        Ok(MultiProviderAnalysis {
            results,
            failed,
            consensus,
        })
    }

    /// Analyze many items with the best provider, at most three calls in
    /// flight for this batch. Output order matches input order.
    pub async fn analyze_batch(
        &self,
        items: &[RaidItem],
        mode: AnalysisMode,
    ) -> Result<Vec<BatchItemResult>, AppError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let config = self
            .best_provider()
            .await
            .ok_or(AppError::NoProviderAvailable)?;

        let semaphore = Semaphore::new(BATCH_CONCURRENCY);
        let tasks = items.iter().map(|item| {
            let semaphore = &semaphore;
            let config = &config;
            async move {
                // The semaphore is local and never closed.
                let _permit = semaphore.acquire().await.ok();
                BatchItemResult {
                    item_id: item.id.clone(),
                    item_title: item.title.clone(),
                    result: self.analyze_one(item, config, mode).await,
                }
            }
        });
        let results = join_all(tasks).await;

        self.event_bus.publish(AnalysisEvent::BatchCompleted {
            provider_id: config.id.clone(),
            items: results.len(),
        });
        Ok(results)
    }

    // --- Summaries ---

    pub async fn health(&self) -> HealthSummary {
        let (providers_count, active_providers) = self.registry.counts().await;
        HealthSummary {
            providers_count,
            active_providers,
        }
    }

    /// Current health of every provider, in registry order.
    pub async fn health_snapshot(&self) -> AnalysisEvent {
        let providers = self
            .registry
            .list()
            .await
            .into_iter()
            .map(|p| ProviderHealth {
                provider_id: p.id,
                enabled: p.enabled,
                status: p.status,
            })
            .collect();
        AnalysisEvent::ProviderSnapshot { providers }
    }

    pub async fn ai_config(&self) -> AiConfigSummary {
        match self.best_provider().await {
            Some(config) => AiConfigSummary {
                provider: Some(config.provider),
                model: Some(config.model),
                available: true,
            },
            None => AiConfigSummary {
                provider: None,
                model: None,
                available: false,
            },
        }
    }
}

fn canary_answered(reply: &str) -> bool {
    reply.to_lowercase().contains("successful") || reply.contains(CANARY_REPLY)
}

fn model_info(config: &ProviderConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("provider".to_string(), config.provider.to_string()),
        ("model".to_string(), config.model.clone()),
    ])
}

/// Degraded result for a failed call: the item's own priority and status
/// are echoed back untouched.
fn provider_failure(
    item: &RaidItem,
    config: &ProviderConfig,
    err: &ProviderError,
    elapsed: f64,
) -> AnalysisResult {
    AnalysisResult {
        analysis: format!(
            "Unable to complete AI analysis for this {} using {}. Please review manually.",
            item.item_type.as_str(),
            config.name
        ),
        suggested_priority: item.priority,
        suggested_status: Some(item.status),
        confidence: 0.0,
        flags: vec![AnalysisFlag::new(
            FLAG_PROVIDER_ERROR,
            format!("{} failed: {err}", config.label()),
            FlagSeverity::High,
        )],
        provider_used: Some(format!("{} (Error)", config.label())),
        response_time: Some(elapsed),
    }
}

/// Mean confidence and modal priority over successful results. Equal counts
/// resolve to the more urgent priority.
pub(crate) fn consensus(successes: &[AnalysisResult], failed: usize) -> Consensus {
    let average_confidence = if successes.is_empty() {
        0.0
    } else {
        successes.iter().map(|r| r.confidence).sum::<f64>() / successes.len() as f64
    };

    let mut counts: BTreeMap<Priority, usize> = BTreeMap::new();
    for result in successes {
        *counts.entry(result.suggested_priority).or_default() += 1;
    }
    let suggested_priority = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(priority, _)| priority);

    Consensus {
        average_confidence,
        suggested_priority,
        providers_succeeded: successes.len(),
        providers_failed: failed,
    }
}
