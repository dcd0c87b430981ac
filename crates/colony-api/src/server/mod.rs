use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use colony_core::{Decision, IntentOracle, Kernel, OracleContext, RuleOracle};
use contracts::{
    ActionResponse, ApiError, BoardSummary, ErrorCode, Intent, PlanView, Task, TickReport,
    WorldSnapshot, SCHEMA_VERSION_V1,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{load_catalog, ConfigError, ServiceConfig};

include!("error.rs");
include!("state.rs");
include!("routes/world.rs");
include!("routes/agents.rs");
include!("routes/board.rs");
include!("util.rs");

pub async fn serve(config: ServiceConfig) -> Result<(), ServerError> {
    let catalog = load_catalog(config.catalog_path.as_deref())?;
    let state = AppState::new(Kernel::new(catalog, config.planner));
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "planner listening");
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/world", post(submit_world))
        .route("/api/v1/agents/{agent_id}/next_action", post(next_action))
        .route("/api/v1/agents/{agent_id}/plan", get(get_plan))
        .route("/api/v1/agents/{agent_id}/clear", post(clear_plan))
        .route("/api/v1/board", get(get_board))
        .route("/api/v1/tasks/{task_id}", delete(cancel_task))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
