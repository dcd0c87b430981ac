//! Planning contracts: goals, blackboard tasks, intents, and primitive actions.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Capability, ItemId};

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// Which entities a goal looks at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Every non-agent entity in the world.
    Global,
    /// Exactly the entity with this name.
    Named(String),
    /// Every entity whose category or name starts with this prefix.
    Prefix(String),
}

impl Selector {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("Global"),
            Self::Named(name) => f.write_str(name),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

/// Expected value of a goal. Integers stay integers on the wire; anything
/// with a fraction becomes `Float`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GoalValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl GoalValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

// Floats compare bitwise so that goal identity stays an equivalence relation.
impl PartialEq for GoalValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for GoalValue {}

impl Hash for GoalValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(value) => value.hash(state),
            Self::Float(value) => value.to_bits().hash(state),
            Self::Bool(value) => value.hash(state),
            Self::Text(value) => value.hash(state),
        }
    }
}

impl From<i64> for GoalValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for GoalValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for GoalValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for GoalValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for GoalValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for GoalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// A predicate over world state: completion condition of a task or a gate on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub target: Selector,
    /// Dotted path; `inventory.<item>` addresses the inventory map.
    pub attribute: String,
    pub comparator: Comparator,
    pub expected: GoalValue,
    #[serde(default)]
    pub exclude: Option<String>,
}

impl Goal {
    pub fn new(
        target: Selector,
        attribute: impl Into<String>,
        comparator: Comparator,
        expected: impl Into<GoalValue>,
    ) -> Self {
        Self {
            target,
            attribute: attribute.into(),
            comparator,
            expected: expected.into(),
            exclude: None,
        }
    }

    /// `target.inventory.<item> >= amount`
    pub fn stock_at_least(target: Selector, item_id: ItemId, amount: i64) -> Self {
        Self::new(target, inventory_path(item_id), Comparator::Ge, amount)
    }

    pub fn excluding(mut self, entity: impl Into<String>) -> Self {
        self.exclude = Some(entity.into());
        self
    }

    /// Structural identity used for blackboard deduplication. The exclusion is
    /// deliberately not part of it.
    pub fn same_target(&self, other: &Goal) -> bool {
        self.target == other.target
            && self.attribute == other.attribute
            && self.comparator == other.comparator
            && self.expected == other.expected
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        if let Some(excluded) = &self.exclude {
            write!(f, "(-{excluded})")?;
        }
        write!(
            f,
            ".{} {} {}",
            self.attribute,
            self.comparator.symbol(),
            self.expected
        )
    }
}

pub fn inventory_path(item_id: ItemId) -> String {
    format!("inventory.{item_id}")
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub type TaskId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Produce,
    Transport,
    Craft,
    Plant,
    Harvest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    Perception,
    Synthesizer,
    External,
}

/// Claim bookkeeping. Completed and cancelled tasks leave the board, so every
/// stored task is live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Claimed {
        agent_id: String,
        /// Tick of the claim or of its last renewal.
        #[serde(default)]
        since_tick: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMetadata {
    pub item_id: ItemId,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    pub quantity: i64,
}

/// A task before the blackboard has assigned it an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDraft {
    pub kind: TaskKind,
    pub description: String,
    pub goal: Goal,
    #[serde(default)]
    pub preconditions: Vec<Goal>,
    pub priority: i64,
    #[serde(default)]
    pub required_capability: Option<Capability>,
    #[serde(default)]
    pub metadata: Option<TaskMetadata>,
    pub origin: TaskOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub goal: Goal,
    pub preconditions: Vec<Goal>,
    pub priority: i64,
    pub required_capability: Option<Capability>,
    pub metadata: Option<TaskMetadata>,
    pub origin: TaskOrigin,
    pub status: TaskStatus,
}

impl Task {
    pub fn from_draft(task_id: TaskId, draft: TaskDraft) -> Self {
        Self {
            task_id,
            kind: draft.kind,
            description: draft.description,
            goal: draft.goal,
            preconditions: draft.preconditions,
            priority: draft.priority,
            required_capability: draft.required_capability,
            metadata: draft.metadata,
            origin: draft.origin,
            status: TaskStatus::Open,
        }
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.metadata.as_ref().map(|meta| meta.item_id)
    }

    /// Where the work happens: the metadata destination, else the entity the
    /// goal is about.
    pub fn destination(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.destination.as_deref())
            .or(match &self.goal.target {
                Selector::Named(name) => Some(name.as_str()),
                _ => None,
            })
    }

    pub fn claimed_by(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Claimed { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Primitive actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Take,
    Put,
    Use,
    Wait,
}

/// One primitive step. `Use` carries the recipe or item id in `item_id`;
/// `Wait` carries minutes in `quantity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedAction {
    pub kind: ActionKind,
    pub target: Option<String>,
    pub item_id: Option<ItemId>,
    pub quantity: u32,
}

impl PlannedAction {
    pub fn move_to(target: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Move,
            target: Some(target.into()),
            item_id: None,
            quantity: 0,
        }
    }

    pub fn take(source: impl Into<String>, item_id: ItemId, quantity: u32) -> Self {
        Self {
            kind: ActionKind::Take,
            target: Some(source.into()),
            item_id: Some(item_id),
            quantity,
        }
    }

    pub fn put(destination: impl Into<String>, item_id: ItemId, quantity: u32) -> Self {
        Self {
            kind: ActionKind::Put,
            target: Some(destination.into()),
            item_id: Some(item_id),
            quantity,
        }
    }

    pub fn use_at(target: impl Into<String>, param: ItemId) -> Self {
        Self {
            kind: ActionKind::Use,
            target: Some(target.into()),
            item_id: Some(param),
            quantity: 0,
        }
    }

    pub fn use_facility(target: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Use,
            target: Some(target.into()),
            item_id: None,
            quantity: 0,
        }
    }

    /// Consume an item from the agent's own inventory.
    pub fn use_item(item_id: ItemId) -> Self {
        Self {
            kind: ActionKind::Use,
            target: None,
            item_id: Some(item_id),
            quantity: 1,
        }
    }

    pub fn wait(minutes: u32) -> Self {
        Self {
            kind: ActionKind::Wait,
            target: None,
            item_id: None,
            quantity: minutes,
        }
    }

    pub fn target_name(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(target) = &self.target {
            write!(f, " target={target}")?;
        }
        if let Some(item_id) = self.item_id {
            write!(f, " item={item_id}")?;
        }
        if self.quantity > 0 {
            write!(f, " qty={}", self.quantity)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanResult {
    pub ok: bool,
    pub actions: Vec<PlannedAction>,
    pub note: String,
}

impl PlanResult {
    pub fn success(actions: Vec<PlannedAction>, note: impl Into<String>) -> Self {
        Self {
            ok: true,
            actions,
            note: note.into(),
        }
    }

    pub fn failure(wait_minutes: u32, note: impl Into<String>) -> Self {
        Self {
            ok: false,
            actions: vec![PlannedAction::wait(wait_minutes)],
            note: note.into(),
        }
    }
}

/// Result of the once-per-tick retire, claim expiry and perception pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: u64,
    pub retired: Vec<TaskId>,
    /// Claims handed back because the holder left or went quiet.
    #[serde(default)]
    pub reopened: Vec<TaskId>,
    pub posted: Vec<TaskId>,
    pub active: usize,
}

/// One row of the board printout: the task plus how far its goal is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskView {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub priority: i64,
    pub required_capability: Option<Capability>,
    pub status: TaskStatus,
    pub goal: String,
    pub current: Option<String>,
    pub expected: String,
    pub preconditions_met: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BoardSummary {
    pub total: usize,
    pub open: usize,
    pub claimed: usize,
    pub tasks: Vec<TaskView>,
}

/// What the caller receives for one agent request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub agent_id: String,
    pub action: PlannedAction,
    pub ok: bool,
    pub note: String,
    pub remaining_steps: usize,
    pub from_cache: bool,
    pub intent: Option<Intent>,
}

/// Read-only copy of an agent's cached plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanView {
    pub agent_id: String,
    pub intent: Option<Intent>,
    pub queued: Vec<PlannedAction>,
    pub feedback: Option<String>,
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// High-level behavior requested by the decision oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Eat,
    Sleep,
    Craft {
        product: String,
    },
    Plant {
        #[serde(default)]
        target: Option<String>,
    },
    Harvest {
        #[serde(default)]
        target: Option<String>,
    },
    Transport {
        item_id: ItemId,
        source: String,
        destination: String,
        #[serde(default = "one")]
        quantity: u32,
    },
    Wait {
        #[serde(default = "default_wait_minutes")]
        minutes: u32,
    },
    CheckBoard,
}

fn one() -> u32 {
    1
}

fn default_wait_minutes() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentParseError {
    #[error("unknown intent: {0}")]
    Unknown(String),
    #[error("intent {intent} is missing parameter {param}")]
    MissingParam {
        intent: &'static str,
        param: &'static str,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Eat => "Eat",
            Self::Sleep => "Sleep",
            Self::Craft { .. } => "Craft",
            Self::Plant { .. } => "Plant",
            Self::Harvest { .. } => "Harvest",
            Self::Transport { .. } => "Transport",
            Self::Wait { .. } => "Wait",
            Self::CheckBoard => "CheckBoard",
        }
    }

    /// Build an intent from an oracle's raw `(command, params)` pair. Names are
    /// matched case-insensitively; parameter keys accept the game's aliases.
    pub fn from_parts(name: &str, params: &Value) -> Result<Self, IntentParseError> {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| params.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let number = |keys: &[&str]| {
            keys.iter().find_map(|key| {
                params.get(*key).and_then(|value| {
                    value
                        .as_u64()
                        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
                })
            })
        };

        match name.trim().to_ascii_lowercase().as_str() {
            "eat" => Ok(Self::Eat),
            "sleep" => Ok(Self::Sleep),
            "craft" => text(&["product", "target_name", "target"])
                .map(|product| Self::Craft { product })
                .ok_or(IntentParseError::MissingParam {
                    intent: "Craft",
                    param: "product",
                }),
            "plant" => Ok(Self::Plant {
                target: text(&["target", "target_name"]),
            }),
            "harvest" => Ok(Self::Harvest {
                target: text(&["target", "target_name"]),
            }),
            "transport" => {
                let item_id = number(&["item_id"]).ok_or(IntentParseError::MissingParam {
                    intent: "Transport",
                    param: "item_id",
                })?;
                let source = text(&["source", "target_name"]).ok_or(
                    IntentParseError::MissingParam {
                        intent: "Transport",
                        param: "source",
                    },
                )?;
                let destination = text(&["destination", "aux_name"]).ok_or(
                    IntentParseError::MissingParam {
                        intent: "Transport",
                        param: "destination",
                    },
                )?;
                let quantity = number(&["quantity", "count"]).unwrap_or(1);
                Ok(Self::Transport {
                    item_id: u32::try_from(item_id).unwrap_or(u32::MAX),
                    source,
                    destination,
                    quantity: u32::try_from(quantity).unwrap_or(u32::MAX),
                })
            }
            "wait" => Ok(Self::Wait {
                minutes: number(&["minutes"])
                    .and_then(|minutes| u32::try_from(minutes).ok())
                    .unwrap_or_else(default_wait_minutes),
            }),
            "checkboard" | "checkblackboard" | "check_board" => Ok(Self::CheckBoard),
            other => Err(IntentParseError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn goal_identity_ignores_exclusion() {
        let a = Goal::stock_at_least(Selector::Global, 5, 1);
        let b = Goal::stock_at_least(Selector::Global, 5, 1).excluding("WorkStation");
        let c = Goal::stock_at_least(Selector::Global, 5, 2);
        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
    }

    #[test]
    fn goal_display_reads_like_a_condition() {
        let goal = Goal::stock_at_least(Selector::Global, 5, 1).excluding("F");
        assert_eq!(goal.to_string(), "Global(-F).inventory.5 >= 1");
    }

    #[test]
    fn goal_serializes_comparator_as_symbol() {
        let goal = Goal::stock_at_least(Selector::named("Storage"), 1001, 3);
        let value = serde_json::to_value(&goal).expect("serialize");
        assert_eq!(value["comparator"], json!(">="));
        assert_eq!(value["target"], json!({ "named": "Storage" }));
        assert_eq!(value["expected"], json!(3));
    }

    #[test]
    fn fractional_expected_values_deserialize_as_floats() {
        let goal: Goal = serde_json::from_value(json!({
            "target": { "named": "Chamber_1" },
            "attribute": "cultivate_info.growth",
            "comparator": ">=",
            "expected": 2.5,
        }))
        .expect("float goal");
        assert_eq!(goal.expected, GoalValue::Float(2.5));
        assert_eq!(goal.expected.as_number(), Some(2.5));
        assert_eq!(goal.to_string(), "Chamber_1.cultivate_info.growth >= 2.5");

        let whole: GoalValue = serde_json::from_value(json!(3)).expect("int");
        assert_eq!(whole, GoalValue::Int(3));
        assert_ne!(whole, GoalValue::Float(3.0));
    }

    #[test]
    fn intent_from_parts_accepts_game_aliases() {
        let craft = Intent::from_parts("craft", &json!({ "target_name": "Coat" })).expect("craft");
        assert_eq!(
            craft,
            Intent::Craft {
                product: "Coat".to_string()
            }
        );

        let transport = Intent::from_parts(
            "Transport",
            &json!({ "item_id": "1001", "target_name": "Storage", "aux_name": "WorkStation" }),
        )
        .expect("transport");
        assert_eq!(
            transport,
            Intent::Transport {
                item_id: 1001,
                source: "Storage".to_string(),
                destination: "WorkStation".to_string(),
                quantity: 1,
            }
        );

        assert_eq!(
            Intent::from_parts("CheckBlackboard", &json!({})).expect("board"),
            Intent::CheckBoard
        );
    }

    #[test]
    fn intent_from_parts_rejects_unknown_names_and_missing_params() {
        assert_eq!(
            Intent::from_parts("Dance", &json!({})),
            Err(IntentParseError::Unknown("dance".to_string()))
        );
        assert!(matches!(
            Intent::from_parts("Craft", &json!({})),
            Err(IntentParseError::MissingParam { param: "product", .. })
        ));
    }

    #[test]
    fn intent_round_trips_through_tagged_json() {
        let intent: Intent =
            serde_json::from_value(json!({ "intent": "wait" })).expect("wait intent");
        assert_eq!(intent, Intent::Wait { minutes: 10 });
        let craft = serde_json::to_value(Intent::Craft {
            product: "Coat".to_string(),
        })
        .expect("serialize");
        assert_eq!(craft, json!({ "intent": "craft", "product": "Coat" }));
    }
}
