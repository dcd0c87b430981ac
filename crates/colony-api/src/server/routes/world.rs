#[derive(Debug, Serialize)]
struct HealthResponse {
    schema_version: String,
    status: &'static str,
    active_tasks: usize,
}

#[derive(Debug, Serialize)]
struct TickResponse {
    schema_version: String,
    #[serde(flatten)]
    report: TickReport,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        status: "ok",
        active_tasks: state.kernel().board().len(),
    })
}

async fn submit_world(
    State(state): State<AppState>,
    Json(snapshot): Json<WorldSnapshot>,
) -> Json<TickResponse> {
    let (report, _) = state.ingest(snapshot).await;
    Json(TickResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        report,
    })
}
