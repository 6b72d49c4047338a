pub mod config;
pub mod constants;
pub mod error;
pub mod event_bus;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod services;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::AppError;
use event_bus::EventBus;
use handlers::AppState;
use llm::ClientRegistry;
use services::item_store::ItemStore;
use services::orchestrator::Orchestrator;
use services::provider_registry::ProviderRegistry;

/// Wire registry, clients, orchestrator and item store into shared state.
pub async fn build_state(config: &Config, clients: ClientRegistry) -> Result<AppState, AppError> {
    let registry = ProviderRegistry::seeded(config.default_providers.clone()).await?;
    let event_bus = EventBus::new(256);
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(clients),
        event_bus.clone(),
        config.call_timeout,
    );
    Ok(AppState {
        orchestrator,
        items: Arc::new(ItemStore::new()),
        event_bus,
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/ai/config", get(handlers::ai_config_handler))
        // Provider routes
        .route(
            "/api/ai/providers",
            get(handlers::list_providers_handler).post(handlers::add_provider_handler),
        )
        .route(
            "/api/ai/providers/validate-all",
            post(handlers::validate_all_handler),
        )
        .route(
            "/api/ai/providers/{id}",
            put(handlers::update_provider_handler).delete(handlers::delete_provider_handler),
        )
        .route(
            "/api/ai/providers/{id}/validate",
            post(handlers::validate_provider_handler),
        )
        // Analysis routes
        .route("/api/analyze", post(handlers::analyze_handler))
        .route("/api/analyze/multi", post(handlers::analyze_multi_handler))
        .route("/api/validate", post(handlers::validate_item_handler))
        .route("/api/batch-analyze", post(handlers::batch_analyze_handler))
        // RAID item routes
        .route(
            "/api/raid-items",
            get(handlers::list_items_handler).post(handlers::create_item_handler),
        )
        .route(
            "/api/raid-items/stats/dashboard",
            get(handlers::dashboard_stats_handler),
        )
        .route(
            "/api/raid-items/{id}",
            get(handlers::get_item_handler)
                .put(handlers::update_item_handler)
                .delete(handlers::delete_item_handler),
        )
        .route(
            "/api/raid-items/{id}/analyze",
            post(handlers::analyze_stored_item_handler),
        )
        // WebSocket
        .route("/api/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("raidmaster=info,tower_http=info"));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub async fn run() -> Result<(), AppError> {
    // Load .env file (ok to fail if not present)
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env()?;
    let clients = ClientRegistry::with_http_clients(&config)?;
    let state = build_state(&config, clients).await?;

    let health = state.orchestrator.health().await;
    if health.providers_count == 0 {
        tracing::warn!("no default provider credentials found; add providers via /api/ai/providers");
    } else {
        tracing::info!(providers = health.providers_count, "provider registry seeded");
    }
    if config.validate_on_startup {
        let count = state.orchestrator.validate_all(true).await;
        tracing::info!(count, "startup validation started");
    }

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind {}: {e}", config.bind)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::Internal(format!("Failed to read local address: {e}")))?;
    tracing::info!(%addr, "{} listening", constants::SERVICE_NAME);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {e}")))
}
