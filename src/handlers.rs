use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::constants::SERVICE_NAME;
use crate::error::AppError;
use crate::event_bus::EventBus;
use crate::models::{
    AddProviderRequest, AiConfigSummary, AnalysisMode, AnalysisResult, AnalyzeRequest,
    BatchAnalyzeRequest, BatchAnalyzeResponse, DashboardStats, HealthStatus, ItemListResponse,
    ItemMessageResponse, ItemPatch, MultiAnalyzeRequest, MultiProviderAnalysis,
    ProviderListResponse, ProviderView, RaidItem, StoredItemAnalyzeRequest, TrackedItem,
    UpdateProviderRequest, ValidateAllRequest, ValidationResult,
};
use crate::services::item_store::ItemStore;
use crate::services::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub items: Arc<ItemStore>,
    pub event_bus: EventBus,
}

// --- Health ---

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let health = state.orchestrator.health().await;
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "providers_count": health.providers_count,
        "active_providers": health.active_providers,
    }))
}

pub async fn ai_config_handler(State(state): State<AppState>) -> Json<AiConfigSummary> {
    Json(state.orchestrator.ai_config().await)
}

// --- Provider handlers ---

pub async fn list_providers_handler(State(state): State<AppState>) -> Json<ProviderListResponse> {
    let providers: Vec<ProviderView> = state
        .orchestrator
        .registry()
        .list()
        .await
        .iter()
        .map(ProviderView::from)
        .collect();
    let active = providers
        .iter()
        .filter(|p| p.status == HealthStatus::Active)
        .count();
    Json(ProviderListResponse {
        total: providers.len(),
        active,
        providers,
    })
}

pub async fn add_provider_handler(
    State(state): State<AppState>,
    Json(request): Json<AddProviderRequest>,
) -> Result<Json<ProviderView>, AppError> {
    let config = state.orchestrator.registry().add(request).await?;
    tracing::info!(provider_id = %config.id, vendor = %config.provider, model = %config.model, "provider added");
    Ok(Json(ProviderView::from(&config)))
}

pub async fn update_provider_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateProviderRequest>,
) -> Result<Json<ProviderView>, AppError> {
    let config = state.orchestrator.registry().update(&id, patch).await?;
    Ok(Json(ProviderView::from(&config)))
}

pub async fn delete_provider_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let removed = state.orchestrator.registry().remove(&id).await?;
    tracing::info!(provider_id = %removed.id, "provider removed");
    Ok(Json(json!({
        "message": "Provider deleted successfully",
        "id": removed.id,
    })))
}

pub async fn validate_provider_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ValidationResult>, AppError> {
    let result = state.orchestrator.validate(&id).await?;
    Ok(Json(result))
}

pub async fn validate_all_handler(
    State(state): State<AppState>,
    body: Option<Json<ValidateAllRequest>>,
) -> Json<Value> {
    let enabled_only = body
        .and_then(|Json(req)| req.enabled_only)
        .unwrap_or(true);
    let count = state.orchestrator.validate_all(enabled_only).await;
    Json(json!({
        "message": format!("Validation started for {count} providers"),
        "count": count,
    }))
}

// --- Analysis handlers ---

pub async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = state
        .orchestrator
        .analyze(
            &request.item,
            request.analysis_type,
            request.provider_id.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

pub async fn validate_item_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = state
        .orchestrator
        .analyze(
            &request.item,
            AnalysisMode::Validation,
            request.provider_id.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

pub async fn analyze_multi_handler(
    State(state): State<AppState>,
    Json(request): Json<MultiAnalyzeRequest>,
) -> Result<Json<MultiProviderAnalysis>, AppError> {
    let result = state
        .orchestrator
        .analyze_multi(
            &request.item,
            request.analysis_type,
            request.providers.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

pub async fn batch_analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchAnalyzeRequest>,
) -> Result<Json<BatchAnalyzeResponse>, AppError> {
    let results = state
        .orchestrator
        .analyze_batch(&request.items, request.analysis_type)
        .await?;
    Ok(Json(BatchAnalyzeResponse { results }))
}

// --- RAID item handlers ---

pub async fn list_items_handler(State(state): State<AppState>) -> Json<ItemListResponse> {
    let items = state.items.list_items().await;
    Json(ItemListResponse {
        total: items.len(),
        items,
    })
}

pub async fn create_item_handler(
    State(state): State<AppState>,
    Json(new): Json<RaidItem>,
) -> Result<Json<ItemMessageResponse>, AppError> {
    let item = state.items.create_item(new).await?;
    Ok(Json(ItemMessageResponse {
        message: "RAID item created successfully".to_string(),
        item,
    }))
}

pub async fn get_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrackedItem>, AppError> {
    Ok(Json(state.items.get_item(&id).await?))
}

pub async fn update_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<ItemMessageResponse>, AppError> {
    let item = state.items.update_item(&id, patch).await?;
    Ok(Json(ItemMessageResponse {
        message: "RAID item updated successfully".to_string(),
        item,
    }))
}

pub async fn delete_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemMessageResponse>, AppError> {
    let item = state.items.delete_item(&id).await?;
    Ok(Json(ItemMessageResponse {
        message: "RAID item deleted successfully".to_string(),
        item,
    }))
}

pub async fn dashboard_stats_handler(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.items.dashboard_stats().await)
}

pub async fn analyze_stored_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<StoredItemAnalyzeRequest>>,
) -> Result<Json<TrackedItem>, AppError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let item = state.items.get_item(&id).await?;
    let result = state
        .orchestrator
        .analyze(
            &item.to_raid_item(),
            request.analysis_type,
            request.provider_id.as_deref(),
        )
        .await?;
    let item = state.items.attach_analysis(&id, result).await?;
    Ok(Json(item))
}
