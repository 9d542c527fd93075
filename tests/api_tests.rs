//! HTTP surface tests: gateway routes, admin CRUD, health.

use axum_test::TestServer;
use gateway::types::{ApiFormat, PoolKind};
use gateway::{AppState, Settings};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server() -> (TestServer, AppState) {
    let state = AppState::initialize(Settings::default())
        .await
        .expect("in-memory state");
    let app = gateway::api::router().with_state(state.clone());
    (TestServer::new(app).expect("test server"), state)
}

#[tokio::test]
async fn test_health() {
    let (server, _) = server().await;
    let res = server.get("/health").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_list_models_exposes_virtual_names() {
    let (server, _) = server().await;
    let res = server.get("/v1/models").await;
    res.assert_status_ok();

    let body = res.json::<Value>();
    assert_eq!(body["object"], "list");
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["haiku", "sonnet", "opus"]);
}

#[tokio::test]
async fn test_missing_model_is_rejected_with_400() {
    let (server, _) = server().await;
    let res = server
        .post("/v1/chat/completions")
        .json(&json!({"messages": []}))
        .await;
    res.assert_status_bad_request();

    let body = res.json::<Value>();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("model"));
}

#[tokio::test]
async fn test_empty_pool_yields_502_envelope() {
    let (server, _) = server().await;
    let res = server
        .post("/v1/messages")
        .json(&json!({"model": "sonnet", "messages": []}))
        .await;
    res.assert_status(axum::http::StatusCode::BAD_GATEWAY);

    let body = res.json::<Value>();
    assert_eq!(body["error"]["type"], "no_endpoint_available");
}

#[tokio::test]
async fn test_terminal_upstream_error_becomes_502_with_detail() {
    let (server, state) = server().await;
    let upstream = MockServer::start().await;
    seed_endpoint(&state, &upstream.uri(), "gpt-4o").await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&upstream)
        .await;

    let res = server
        .post("/v1/chat/completions")
        .json(&json!({"model": "sonnet", "messages": []}))
        .await;
    res.assert_status(axum::http::StatusCode::BAD_GATEWAY);

    let body = res.json::<Value>();
    assert_eq!(body["error"]["type"], "upstream_terminal");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("HTTP 401"));
}

#[tokio::test]
async fn test_gateway_streams_upstream_sse() {
    let (server, state) = server().await;
    let upstream = MockServer::start().await;
    seed_endpoint(&state, &upstream.uri(), "gpt-4o-upstream").await;

    let sse =
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o-upstream\",\"choices\":[]}\n\ndata: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .expect(1)
        .mount(&upstream)
        .await;

    let res = server
        .post("/v1/chat/completions")
        .json(&json!({"model": "sonnet", "messages": []}))
        .await;
    res.assert_status_ok();
    res.assert_header("content-type", "text/event-stream");
    res.assert_header("cache-control", "no-cache");

    let text = res.text();
    assert!(text.contains("\"model\":\"sonnet\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

async fn seed_endpoint(state: &AppState, base_url: &str, model: &str) -> i64 {
    let provider = state
        .store
        .create_provider(gateway::types::ProviderCreate {
            name: "seeded".into(),
            base_url: base_url.to_string(),
            api_key: "sk-test".into(),
            api_format: ApiFormat::OpenAI,
            enabled: true,
        })
        .await
        .unwrap();
    state
        .store
        .create_endpoint(gateway::types::EndpointCreate {
            provider_id: provider.id,
            model_id: model.to_string(),
            pool: Some(PoolKind::Normal),
            enabled: true,
            weight: 1,
            min_interval_seconds: 0,
        })
        .await
        .unwrap()
        .id
}

// ============= Admin surface =============

#[tokio::test]
async fn test_admin_provider_endpoint_lifecycle() {
    let (server, _) = server().await;

    // Create a provider.
    let res = server
        .post("/admin/providers")
        .json(&json!({
            "name": "alpha",
            "base_url": "https://alpha.example.com/v1/",
            "api_key": "sk-alpha",
            "api_format": "openai",
        }))
        .await;
    res.assert_status_ok();
    let provider = res.json::<Value>();
    let provider_id = provider["id"].as_i64().unwrap();
    assert_eq!(provider["base_url"], "https://alpha.example.com/v1");

    // Attach endpoints, one directly and two via batch.
    let res = server
        .post("/admin/endpoints")
        .json(&json!({
            "provider_id": provider_id,
            "model_id": "m1",
            "pool": "normal",
            "weight": 3,
        }))
        .await;
    res.assert_status_ok();
    let endpoint_id = res.json::<Value>()["id"].as_i64().unwrap();

    let res = server
        .post("/admin/endpoints/batch")
        .json(&json!([
            {"provider_id": provider_id, "model_id": "m2", "pool": "normal"},
            {"provider_id": provider_id, "model_id": "m3", "pool": "tool"},
        ]))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>().as_array().unwrap().len(), 2);

    // Listing nests endpoints under their provider.
    let res = server.get("/admin/providers").await;
    res.assert_status_ok();
    let listed = res.json::<Value>();
    assert_eq!(listed[0]["name"], "alpha");
    assert_eq!(listed[0]["endpoints"].as_array().unwrap().len(), 3);

    // Reassign an endpoint to another pool.
    let res = server
        .put(&format!("/admin/endpoints/{}", endpoint_id))
        .json(&json!({"pool": "advanced", "weight": 2}))
        .await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["pool"], "advanced");

    // Pool status groups by provider and reports health.
    let res = server.get("/admin/pools/advanced/status").await;
    res.assert_status_ok();
    let status = res.json::<Value>();
    assert_eq!(status["total_endpoints"], 1);
    assert_eq!(status["healthy_endpoints"], 1);
    assert_eq!(status["providers"][0]["models"][0]["is_cooling"], false);

    // Deleting the provider cascades.
    let res = server
        .delete(&format!("/admin/providers/{}", provider_id))
        .await;
    res.assert_status_ok();
    let res = server.get("/admin/providers").await;
    assert!(res.json::<Value>().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_pool_update_and_validation() {
    let (server, _) = server().await;

    let res = server.get("/admin/pools").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>().as_array().unwrap().len(), 3);

    let res = server
        .put("/admin/pools/normal")
        .json(&json!({"cooldown_seconds": 120, "timeout_seconds": 90}))
        .await;
    res.assert_status_ok();
    let pool = res.json::<Value>();
    assert_eq!(pool["cooldown_seconds"], 120);
    assert_eq!(pool["timeout_seconds"], 90);

    let res = server
        .put("/admin/pools/premium")
        .json(&json!({"cooldown_seconds": 1}))
        .await;
    res.assert_status_bad_request();
}

#[tokio::test]
async fn test_admin_logs_and_cooldowns() {
    let (server, state) = server().await;

    // Park an endpoint id by hand and clear it over the API.
    state
        .pool_manager
        .cooldown_tracker()
        .park(42, std::time::Duration::from_secs(600), "manual");
    assert!(state.pool_manager.cooldown_tracker().is_parked(42));

    let res = server.delete("/admin/cooldowns/42").await;
    res.assert_status_ok();
    assert!(!state.pool_manager.cooldown_tracker().is_parked(42));

    // Log listing is empty, then reflects appended records.
    let res = server.get("/admin/logs").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["total"], 0);

    state
        .telemetry
        .record(gateway::types::NewRequestLog {
            pool: PoolKind::Normal,
            requested_model: "sonnet".into(),
            actual_model: "gpt-4o".into(),
            provider_name: "alpha".into(),
            success: true,
            status_code: Some(200),
            error_message: None,
            latency_ms: 5,
            input_tokens: None,
            output_tokens: None,
        })
        .await;

    let res = server.get("/admin/logs").await;
    assert_eq!(res.json::<Value>()["total"], 1);

    let res = server.delete("/admin/logs").await;
    res.assert_status_ok();
    let res = server.get("/admin/logs").await;
    assert_eq!(res.json::<Value>()["total"], 0);
}
