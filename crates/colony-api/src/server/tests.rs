use super::*;

use axum::body::{to_bytes, Body};
use colony_core::RecipeCatalog;
use contracts::{EntityState, PlannedAction, PlannerConfig};
use serde_json::json;
use tower::ServiceExt;

fn app() -> Router {
    router(AppState::new(Kernel::new(
        RecipeCatalog::default(),
        PlannerConfig::default(),
    )))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn bedroom() -> Value {
    serde_json::to_value(WorldSnapshot::new(vec![
        EntityState::facility("Bed_1", "Bed"),
        EntityState::facility("Storage", "Storage").with_item(5, 20),
        EntityState::facility("Bench", "WorkStation"),
        EntityState::agent("alice").at("Storage"),
    ]))
    .expect("snapshot json")
}

#[tokio::test]
async fn next_action_without_a_world_is_rejected() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/agents/alice/next_action",
        Some(json!({ "intent": { "intent": "sleep" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "SNAPSHOT_MISSING");
}

#[tokio::test]
async fn typed_intent_compiles_then_continues_from_cache() {
    let app = app();
    let (status, _) = call(&app, Method::POST, "/api/v1/world", Some(bedroom())).await;
    assert_eq!(status, StatusCode::OK);

    let request = json!({ "intent": { "intent": "sleep" } });
    let (status, first) = call(
        &app,
        Method::POST,
        "/api/v1/agents/alice/next_action",
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["schema_version"], SCHEMA_VERSION_V1);
    assert_eq!(first["ok"], true);
    assert_eq!(first["from_cache"], false);
    assert_eq!(
        first["action"],
        serde_json::to_value(PlannedAction::move_to("Bed_1")).expect("action json")
    );

    let (_, plan) = call(&app, Method::GET, "/api/v1/agents/alice/plan", None).await;
    assert_eq!(plan["queued"].as_array().map(Vec::len), Some(1));

    let (_, second) = call(
        &app,
        Method::POST,
        "/api/v1/agents/alice/next_action",
        Some(request),
    )
    .await;
    assert_eq!(second["from_cache"], true);
    assert_eq!(second["remaining_steps"], 0);
}

#[tokio::test]
async fn unknown_raw_command_degrades_to_wait() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/agents/alice/next_action",
        Some(json!({ "command": "Dance", "params": {}, "snapshot": bedroom() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert_eq!(
        body["action"],
        serde_json::to_value(PlannedAction::wait(
            PlannerConfig::default().fallback_wait_minutes
        ))
        .expect("action json")
    );

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/agents/alice/next_action",
        Some(json!({ "command": "Sleep", "intent": { "intent": "eat" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn board_lists_and_cancels_perceived_work() {
    let app = app();
    let world = serde_json::to_value(WorldSnapshot::new(vec![EntityState::facility(
        "Chamber_1",
        "CultivateChamber",
    )
    .with_attribute(
        "cultivate_info",
        json!({ "current_phase": "ECultivatePhase::ECP_WaitingToPlant" }),
    )]))
    .expect("snapshot json");
    let (_, report) = call(&app, Method::POST, "/api/v1/world", Some(world)).await;
    assert_eq!(report["active"], 1);

    let (status, board) = call(&app, Method::GET, "/api/v1/board", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["total"], 1);
    assert_eq!(board["open"], 1);
    let task_id = board["tasks"][0]["task_id"]
        .as_str()
        .expect("task id")
        .to_string();

    let uri = format!("/api/v1/tasks/{task_id}");
    let (status, cancelled) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["cancelled"]["task_id"], task_id.as_str());

    let (status, body) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn plan_inspection_and_clear() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/agents/bob/plan", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "AGENT_NOT_FOUND");

    call(
        &app,
        Method::POST,
        "/api/v1/agents/alice/next_action",
        Some(json!({ "intent": { "intent": "sleep" }, "snapshot": bedroom() })),
    )
    .await;
    let (status, cleared) = call(&app, Method::POST, "/api/v1/agents/alice/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["dropped"], 1);
}

#[tokio::test]
async fn preflight_gets_cors_headers() {
    let app = app();
    let request = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/board")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        HeaderValue::from_static("*")
    );
}
