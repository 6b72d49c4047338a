use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use raidmaster::config::Config;
use raidmaster::constants::{CANARY_PROMPT, CANARY_REPLY};
use raidmaster::error::ProviderError;
use raidmaster::llm::types::ChatRequest;
use raidmaster::llm::{ChatClient, ClientRegistry};
use raidmaster::models::Vendor;
use raidmaster::{build_router, build_state};

const ANALYSIS_REPLY: &str = r#"Here you go:
{"analysis": "Connection pool is undersized", "suggestedPriority": "P0",
 "suggestedStatus": "Mitigating", "confidence": 0.9,
 "flags": [{"code": "CAPACITY", "severity": "high", "message": "Pool too small"}]}"#;

struct StubClient {
    vendor: Vendor,
}

#[async_trait]
impl ChatClient for StubClient {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn send(&self, api_key: &str, request: &ChatRequest) -> Result<String, ProviderError> {
        if api_key == "sk-bad-key-000000" {
            return Err(ProviderError::classify("401 Unauthorized: invalid api key"));
        }
        if request.prompt == CANARY_PROMPT {
            return Ok(CANARY_REPLY.to_string());
        }
        Ok(ANALYSIS_REPLY.to_string())
    }
}

async fn app() -> Router {
    let config = Config::from_lookup(|_| None).unwrap();
    let mut clients = ClientRegistry::new();
    clients.register(Box::new(StubClient {
        vendor: Vendor::OpenAi,
    }));
    clients.register(Box::new(StubClient {
        vendor: Vendor::Anthropic,
    }));
    let state = build_state(&config, clients).await.unwrap();
    build_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn provider(id: &str, vendor: &str, key: &str) -> Value {
    json!({
        "id": id,
        "name": format!("{vendor} test"),
        "provider": vendor,
        "model": "test-model",
        "api_key": key,
    })
}

fn item(title: &str) -> Value {
    json!({
        "type": "Risk",
        "title": title,
        "description": "Connection pool may be exhausted under peak load",
        "status": "Open",
        "priority": "P1",
        "impact": "High",
        "likelihood": "Medium",
        "workstream": "backend-development",
        "owner": "system-admin",
    })
}

async fn active_provider(app: &Router, id: &str, vendor: &str) {
    let body = provider(id, vendor, "sk-good-key-123456");
    let (status, _) = send(app, "POST", "/api/ai/providers", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(app, "POST", &format!("/api/ai/providers/{id}/validate"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn health_reports_empty_registry() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "RAIDMASTER AI API");
    assert_eq!(body["providers_count"], 0);
    assert_eq!(body["active_providers"], 0);

    let (_, config) = send(&app, "GET", "/api/ai/config", None).await;
    assert_eq!(config["available"], false);
}

#[tokio::test]
async fn added_provider_is_listed_with_masked_key() {
    let app = app().await;
    let (status, added) = send(
        &app,
        "POST",
        "/api/ai/providers",
        Some(provider("p1", "openai", "sk-good-key-123456")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["status"], "unknown");

    let (_, list) = send(&app, "GET", "/api/ai/providers", None).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["active"], 0);
    assert_eq!(list["providers"][0]["api_key_masked"], "sk-g...3456");
    assert!(!list.to_string().contains("sk-good-key-123456"));
}

#[tokio::test]
async fn duplicate_provider_id_is_rejected() {
    let app = app().await;
    let body = provider("p1", "openai", "sk-good-key-123456");
    send(&app, "POST", "/api/ai/providers", Some(body.clone())).await;
    let (status, error) = send(&app, "POST", "/api/ai/providers", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "invalid_input");
}

#[tokio::test]
async fn validation_sets_health() {
    let app = app().await;
    active_provider(&app, "good", "openai").await;

    send(
        &app,
        "POST",
        "/api/ai/providers",
        Some(provider("bad", "anthropic", "sk-bad-key-000000")),
    )
    .await;
    let (status, result) = send(&app, "POST", "/api/ai/providers/bad/validate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["valid"], false);
    assert_eq!(result["status"], "invalid_key");

    let (_, health) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(health["providers_count"], 2);
    assert_eq!(health["active_providers"], 1);
}

#[tokio::test]
async fn unknown_provider_is_not_found() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/api/ai/providers/missing/validate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "not_found");

    let (status, _) = send(&app, "DELETE", "/api/ai/providers/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/analyze",
        Some(json!({ "item": item("Pool risk"), "providerId": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analyze_without_active_provider_is_unavailable() {
    let app = app().await;
    send(
        &app,
        "POST",
        "/api/ai/providers",
        Some(provider("p1", "openai", "sk-good-key-123456")),
    )
    .await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/analyze",
        Some(json!({ "item": item("Pool risk") })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "no_provider_available");
}

#[tokio::test]
async fn analyze_uses_best_provider() {
    let app = app().await;
    active_provider(&app, "p1", "openai").await;

    let (status, result) = send(
        &app,
        "POST",
        "/api/analyze",
        Some(json!({ "item": item("Pool risk"), "analysisType": "analysis" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["suggestedPriority"], "P0");
    assert_eq!(result["suggestedStatus"], "Mitigating");
    assert_eq!(result["confidence"], 0.9);
    assert_eq!(result["flags"][0]["code"], "CAPACITY");
    assert_eq!(result["providerUsed"], "openai test (test-model)");
}

#[tokio::test]
async fn multi_analysis_reaches_consensus() {
    let app = app().await;
    active_provider(&app, "p1", "openai").await;
    active_provider(&app, "p2", "anthropic").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/analyze/multi",
        Some(json!({ "item": item("Pool risk") })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"].as_array().unwrap().len(), 0);
    assert_eq!(body["consensus"]["suggested_priority"], "P0");
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let app = app().await;
    active_provider(&app, "p1", "openai").await;

    let items: Vec<Value> = (0..5).map(|i| item(&format!("Risk {i}"))).collect();
    let (status, body) = send(
        &app,
        "POST",
        "/api/batch-analyze",
        Some(json!({ "items": items })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result["itemTitle"], format!("Risk {i}"));
        assert_eq!(result["suggestedPriority"], "P0");
    }
}

#[tokio::test]
async fn raid_item_lifecycle() {
    let app = app().await;
    active_provider(&app, "p1", "openai").await;

    let (status, created) = send(&app, "POST", "/api/raid-items", Some(item("Pool risk"))).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["item"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["item"]["severityScore"], 6);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/raid-items/{id}"),
        Some(json!({ "status": "In Progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["item"]["status"], "In Progress");

    let (status, analyzed) = send(&app, "POST", &format!("/api/raid-items/{id}/analyze"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analyzed["ai"]["suggestedPriority"], "P0");

    let (_, stats) = send(&app, "GET", "/api/raid-items/stats/dashboard", None).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_status"]["In Progress"], 1);
    assert_eq!(stats["active_items"], 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/raid-items/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/api/raid-items/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, "GET", "/api/raid-items", None).await;
    assert_eq!(list["total"], 0);
}
