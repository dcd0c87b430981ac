use contracts::{IntentParseError, PlannerConfig, TaskId};

/// Why a compile attempt could not produce a plan. Every variant degrades to a
/// short `Wait` so the agent never stalls; the message becomes the feedback
/// note handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("agent {agent_id} is not in the snapshot")]
    MissingAgent { agent_id: String },
    #[error(transparent)]
    UnknownIntent(#[from] IntentParseError),
    #[error("unknown product '{product}'")]
    UnknownProduct { product: String },
    #[error("no recipe produces '{product}'")]
    MissingRecipe { product: String },
    #[error("no {what} available")]
    MissingTarget { what: String },
    #[error("missing materials: {}; supply tasks posted", missing.join(", "))]
    ResourceShortfall { missing: Vec<String> },
    #[error("no food available; cooking task {task_id} posted")]
    FoodUnavailable { task_id: TaskId },
    #[error("task {task_id} cannot be acted on: {reason}")]
    TaskNotActionable { task_id: TaskId, reason: String },
}

impl PlanError {
    pub fn wait_minutes(&self, config: &PlannerConfig) -> u32 {
        match self {
            Self::ResourceShortfall { .. } => config.shortfall_wait_minutes,
            Self::FoodUnavailable { .. } => config.no_food_wait_minutes,
            _ => config.fallback_wait_minutes,
        }
    }
}
