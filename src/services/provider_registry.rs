use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AddProviderRequest, HealthStatus, ProviderConfig, UpdateProviderRequest};

/// In-memory provider registry. Iteration order is insertion order, and each
/// operation holds the lock for its whole read-modify-write, so readers only
/// ever see complete entries. Reads hand out clones.
pub struct ProviderRegistry {
    providers: RwLock<Vec<ProviderConfig>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
        }
    }

    pub async fn seeded(defaults: Vec<AddProviderRequest>) -> Result<Self, AppError> {
        let registry = Self::new();
        for request in defaults {
            let config = registry.add(request).await?;
            tracing::info!(provider_id = %config.id, vendor = %config.provider, model = %config.model, "seeded default provider");
        }
        Ok(registry)
    }

    pub async fn add(&self, request: AddProviderRequest) -> Result<ProviderConfig, AppError> {
        require_text("name", &request.name)?;
        require_text("model", &request.model)?;
        require_text("api_key", &request.api_key)?;

        let mut providers = self.providers.write().await;
        let id = match request.id.filter(|id| !id.trim().is_empty()) {
            Some(id) if providers.iter().any(|p| p.id == id) => {
                return Err(AppError::InvalidInput(format!(
                    "Provider id '{id}' is already registered"
                )));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let now = Utc::now();
        let config = ProviderConfig {
            id,
            name: request.name.trim().to_string(),
            provider: request.provider,
            model: request.model.trim().to_string(),
            api_key: request.api_key.trim().to_string(),
            enabled: request.enabled,
            status: HealthStatus::Unknown,
            last_validated: None,
            created_at: now,
            updated_at: now,
        };
        providers.push(config.clone());
        Ok(config)
    }

    pub async fn get(&self, id: &str) -> Result<ProviderConfig, AppError> {
        self.providers
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> Vec<ProviderConfig> {
        self.providers.read().await.clone()
    }

    /// Apply a partial patch. Id and creation time are never touched. A new
    /// credential, vendor or model invalidates the previous validation.
    pub async fn update(
        &self,
        id: &str,
        patch: UpdateProviderRequest,
    ) -> Result<ProviderConfig, AppError> {
        if let Some(name) = &patch.name {
            require_text("name", name)?;
        }
        if let Some(model) = &patch.model {
            require_text("model", model)?;
        }
        if let Some(api_key) = &patch.api_key {
            require_text("api_key", api_key)?;
        }

        let mut providers = self.providers.write().await;
        let config = providers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;

        let mut pairing_changed = false;
        if let Some(name) = patch.name {
            config.name = name.trim().to_string();
        }
        if let Some(vendor) = patch.provider {
            pairing_changed |= vendor != config.provider;
            config.provider = vendor;
        }
        if let Some(model) = patch.model {
            let model = model.trim().to_string();
            pairing_changed |= model != config.model;
            config.model = model;
        }
        if let Some(api_key) = patch.api_key {
            let api_key = api_key.trim().to_string();
            pairing_changed |= api_key != config.api_key;
            config.api_key = api_key;
        }
        if let Some(enabled) = patch.enabled {
            config.enabled = enabled;
        }
        if pairing_changed {
            config.status = HealthStatus::Unknown;
            config.last_validated = None;
        }
        config.updated_at = Utc::now();
        Ok(config.clone())
    }

    pub async fn remove(&self, id: &str) -> Result<ProviderConfig, AppError> {
        let mut providers = self.providers.write().await;
        let index = providers
            .iter()
            .position(|p| p.id == id)
            .ok_or(AppError::NotFound)?;
        Ok(providers.remove(index))
    }

    /// Health write used by the orchestrator only. `dispatched` is the
    /// snapshot the call was made with; if the stored entry has since been
    /// re-paired (new vendor, model or credential) the verdict is stale and
    /// nothing is written (`Ok(None)`).
    pub(crate) async fn record_health(
        &self,
        dispatched: &ProviderConfig,
        status: HealthStatus,
        stamp: HealthStamp,
    ) -> Result<Option<ProviderConfig>, AppError> {
        let mut providers = self.providers.write().await;
        let config = providers
            .iter_mut()
            .find(|p| p.id == dispatched.id)
            .ok_or(AppError::NotFound)?;
        if !config.same_pairing(dispatched) {
            return Ok(None);
        }
        config.status = status;
        match stamp {
            HealthStamp::Validated(at) => config.last_validated = Some(at),
            HealthStamp::Cleared => config.last_validated = None,
            HealthStamp::Keep => {}
        }
        Ok(Some(config.clone()))
    }

    pub async fn counts(&self) -> (usize, usize) {
        let providers = self.providers.read().await;
        let active = providers
            .iter()
            .filter(|p| p.status == HealthStatus::Active)
            .count();
        (providers.len(), active)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// What a health write does to `last_validated`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum HealthStamp {
    /// Successful validation.
    Validated(DateTime<Utc>),
    /// Failed validation.
    Cleared,
    /// Failure seen during analysis.
    Keep,
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vendor;

    fn request(name: &str) -> AddProviderRequest {
        AddProviderRequest {
            id: None,
            name: name.to_string(),
            provider: Vendor::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key: "sk-test-123456".to_string(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn add_generates_id_and_starts_unknown() {
        let registry = ProviderRegistry::new();
        let config = registry.add(request("Primary")).await.unwrap();
        assert!(!config.id.is_empty());
        assert_eq!(config.status, HealthStatus::Unknown);
        assert!(config.last_validated.is_none());
        assert_eq!(registry.get(&config.id).await.unwrap().name, "Primary");
    }

    #[tokio::test]
    async fn explicit_duplicate_id_is_rejected() {
        let registry = ProviderRegistry::new();
        let mut first = request("A");
        first.id = Some("p1".to_string());
        registry.add(first.clone()).await.unwrap();
        assert!(matches!(
            registry.add(first).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn empty_credential_is_rejected() {
        let registry = ProviderRegistry::new();
        let mut bad = request("A");
        bad.api_key = "   ".to_string();
        assert!(matches!(registry.add(bad).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let registry = ProviderRegistry::new();
        for name in ["c", "a", "b"] {
            registry.add(request(name)).await.unwrap();
        }
        let names: Vec<String> = registry.list().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn update_preserves_identity_and_creation_time() {
        let registry = ProviderRegistry::new();
        let before = registry.add(request("Old")).await.unwrap();

        let patch = UpdateProviderRequest {
            name: Some("New".to_string()),
            enabled: Some(false),
            ..Default::default()
        };
        registry.update(&before.id, patch).await.unwrap();

        let after = registry.get(&before.id).await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.name, "New");
        assert!(!after.enabled);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn changing_credential_resets_health() {
        let registry = ProviderRegistry::new();
        let config = registry.add(request("A")).await.unwrap();
        registry
            .record_health(&config, HealthStatus::Active, HealthStamp::Validated(Utc::now()))
            .await
            .unwrap();

        let renamed = registry
            .update(
                &config.id,
                UpdateProviderRequest {
                    name: Some("B".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.status, HealthStatus::Active);

        let rekeyed = registry
            .update(
                &config.id,
                UpdateProviderRequest {
                    api_key: Some("sk-other-987654".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rekeyed.status, HealthStatus::Unknown);
        assert!(rekeyed.last_validated.is_none());
    }

    #[tokio::test]
    async fn health_from_old_pairing_is_discarded() {
        let registry = ProviderRegistry::new();
        let dispatched = registry.add(request("A")).await.unwrap();
        registry
            .update(
                &dispatched.id,
                UpdateProviderRequest {
                    model: Some("gpt-4o".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let written = registry
            .record_health(&dispatched, HealthStatus::InvalidModel, HealthStamp::Keep)
            .await
            .unwrap();
        assert!(written.is_none());
        let stored = registry.get(&dispatched.id).await.unwrap();
        assert_eq!(stored.status, HealthStatus::Unknown);

        // a rename keeps the pairing, so the verdict still lands
        let current = registry
            .update(
                &dispatched.id,
                UpdateProviderRequest {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let written = registry
            .record_health(&current, HealthStatus::Active, HealthStamp::Validated(Utc::now()))
            .await
            .unwrap();
        assert_eq!(written.map(|c| c.status), Some(HealthStatus::Active));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let registry = ProviderRegistry::new();
        assert!(matches!(registry.get("nope").await, Err(AppError::NotFound)));
        assert!(matches!(
            registry.update("nope", UpdateProviderRequest::default()).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(registry.remove("nope").await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn remove_deletes_entry() {
        let registry = ProviderRegistry::new();
        let config = registry.add(request("A")).await.unwrap();
        registry.remove(&config.id).await.unwrap();
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn seeded_with_nothing_is_empty() {
        let registry = ProviderRegistry::seeded(Vec::new()).await.unwrap();
        assert_eq!(registry.counts().await, (0, 0));
    }
}
