#[derive(Debug, Serialize)]
struct BoardResponse {
    schema_version: String,
    #[serde(flatten)]
    board: BoardSummary,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    schema_version: String,
    cancelled: Task,
}

/// Goal progress is read against the last submitted world, or an empty one.
async fn get_board(State(state): State<AppState>) -> Json<BoardResponse> {
    let world = state.current_world().await.unwrap_or_default();
    Json(BoardResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        board: state.kernel().board_summary(&world),
    })
}

async fn cancel_task(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CancelResponse>, HttpApiError> {
    let cancelled = state
        .kernel()
        .cancel_task(&task_id)
        .ok_or_else(|| HttpApiError::task_not_found(&task_id))?;
    Ok(Json(CancelResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        cancelled,
    }))
}
