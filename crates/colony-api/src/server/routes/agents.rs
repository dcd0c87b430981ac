/// Either a typed `intent`, a raw `command` with `params`, or neither (the
/// service oracle decides). An inline `snapshot` is ingested before planning.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NextActionRequest {
    intent: Option<Intent>,
    command: Option<String>,
    params: Value,
    snapshot: Option<WorldSnapshot>,
}

#[derive(Debug, Serialize)]
struct NextActionResponse {
    schema_version: String,
    #[serde(flatten)]
    response: ActionResponse,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    schema_version: String,
    #[serde(flatten)]
    plan: PlanView,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    schema_version: String,
    agent_id: String,
    dropped: usize,
}

async fn next_action(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<NextActionRequest>,
) -> Result<Json<NextActionResponse>, HttpApiError> {
    let NextActionRequest {
        intent,
        command,
        params,
        snapshot,
    } = request;
    if intent.is_some() && command.is_some() {
        return Err(HttpApiError::invalid_request(
            "send either intent or command, not both",
            Some(format!("agent_id={agent_id}")),
        ));
    }

    let snapshot = match snapshot {
        Some(snapshot) => state.ingest(snapshot).await.1,
        None => state
            .current_world()
            .await
            .ok_or_else(HttpApiError::snapshot_missing)?,
    };

    let kernel = state.kernel();
    let response = match (intent, command) {
        (Some(intent), _) => kernel.next_action(&agent_id, intent, &snapshot),
        (None, Some(command)) => {
            let relay = RelayedDecision(Decision::new(command, params, "requested by caller"));
            kernel.next_action_with(&agent_id, &relay, &snapshot)
        }
        (None, None) => kernel.next_action_with(&agent_id, state.oracle.as_ref(), &snapshot),
    };
    debug!(
        agent_id = %response.agent_id,
        ok = response.ok,
        from_cache = response.from_cache,
        remaining = response.remaining_steps,
        "served next action"
    );

    Ok(Json(NextActionResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        response,
    }))
}

async fn get_plan(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PlanResponse>, HttpApiError> {
    let plan = state
        .kernel()
        .plans()
        .view(&agent_id)
        .ok_or_else(|| HttpApiError::no_plan(&agent_id))?;
    Ok(Json(PlanResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        plan,
    }))
}

async fn clear_plan(
    Path(agent_id): Path<String>,
    State(state): State<AppState>,
) -> Json<ClearResponse> {
    let dropped = state.kernel().force_clear(&agent_id);
    Json(ClearResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        agent_id,
        dropped,
    })
}
