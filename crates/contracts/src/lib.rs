//! v1 cross-boundary contracts for the planning core, the HTTP binding, and the CLI.

pub mod planning;
pub mod recipes;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use planning::{
    inventory_path, ActionKind, ActionResponse, BoardSummary, Comparator, Goal, GoalValue,
    Intent, IntentParseError, PlanResult, PlanView, PlannedAction, Selector, Task, TaskDraft,
    TaskId, TaskKind, TaskMetadata, TaskOrigin, TaskStatus, TaskView, TickReport,
};
pub use recipes::{Ingredient, ItemDef, Recipe};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Item identifiers as used by the game data tables (e.g. 1001 cotton, 2003 meal).
pub type ItemId = u32;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A skill an agent holds, normalized at the boundary so that `CanFarm`,
/// `canFarm` and ` canfarm ` all compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// World snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    #[default]
    Facility,
}

/// One agent or facility as seen at the moment the snapshot was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EntityState {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub kind: EntityKind,
    /// For agents: the facility they are standing at.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub inventory: BTreeMap<ItemId, i64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

impl EntityState {
    pub fn facility(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            kind: EntityKind::Facility,
            ..Self::default()
        }
    }

    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: "Agent".to_string(),
            kind: EntityKind::Agent,
            ..Self::default()
        }
    }

    pub fn with_item(mut self, item_id: ItemId, quantity: i64) -> Self {
        self.inventory.insert(item_id, quantity);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<Capability>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_agent(&self) -> bool {
        self.kind == EntityKind::Agent
    }

    pub fn stock(&self, item_id: ItemId) -> i64 {
        self.inventory.get(&item_id).copied().unwrap_or(0)
    }

    /// Numeric attribute lookup, used for needs such as `hunger` and `energy`.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(Value::as_f64)
    }
}

/// Read-only view of all entities, supplied by the caller once per planning cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub tick: u64,
    #[serde(default)]
    pub entities: Vec<EntityState>,
}

impl WorldSnapshot {
    pub fn new(entities: Vec<EntityState>) -> Self {
        Self { tick: 0, entities }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityState> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entity(name).is_some()
    }

    pub fn agent(&self, name: &str) -> Option<&EntityState> {
        self.entity(name).filter(|entity| entity.is_agent())
    }

    pub fn facilities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.iter().filter(|entity| !entity.is_agent())
    }

    pub fn agents(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.iter().filter(|entity| entity.is_agent())
    }
}

// ---------------------------------------------------------------------------
// Planner configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    pub produce_priority: i64,
    pub transport_priority: i64,
    pub craft_priority: i64,
    pub farming_priority: i64,
    pub food_item_id: ItemId,
    pub meal_batch: i64,
    pub storage_category: String,
    pub table_category: String,
    pub bed_category: String,
    pub stove_category: String,
    pub cultivation_category: String,
    pub workstation_category: String,
    pub phase_attribute: String,
    pub waiting_to_plant_phase: String,
    pub ready_to_harvest_phase: String,
    pub task_list_attribute: String,
    /// Satiety stat on agents, 100 = fully fed.
    pub satiety_attribute: String,
    /// Energy stat on agents, 100 = fully rested.
    pub energy_attribute: String,
    pub farming_capability: String,
    pub crafting_capability: String,
    pub shortfall_wait_minutes: u32,
    pub no_food_wait_minutes: u32,
    pub fallback_wait_minutes: u32,
    pub idle_wait_minutes: u32,
    pub hunger_high: f64,
    pub exhaustion_high: f64,
    pub hunger_critical: f64,
    pub exhaustion_critical: f64,
    pub duty_per_task: f64,
    pub max_queued_actions: usize,
    /// Ticks a claim survives without its holder continuing the plan.
    pub claim_ttl_ticks: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            produce_priority: 6,
            transport_priority: 5,
            craft_priority: 4,
            farming_priority: 3,
            food_item_id: 2003,
            meal_batch: 3,
            storage_category: "Storage".to_string(),
            table_category: "Table".to_string(),
            bed_category: "Bed".to_string(),
            stove_category: "Stove".to_string(),
            cultivation_category: "CultivateChamber".to_string(),
            workstation_category: "WorkStation".to_string(),
            phase_attribute: "cultivate_info.current_phase".to_string(),
            waiting_to_plant_phase: "WaitingToPlant".to_string(),
            ready_to_harvest_phase: "ReadyToHarvest".to_string(),
            task_list_attribute: "task_list".to_string(),
            satiety_attribute: "hunger".to_string(),
            energy_attribute: "energy".to_string(),
            farming_capability: "canfarm".to_string(),
            crafting_capability: "cancraft".to_string(),
            shortfall_wait_minutes: 10,
            no_food_wait_minutes: 5,
            fallback_wait_minutes: 2,
            idle_wait_minutes: 10,
            hunger_high: 70.0,
            exhaustion_high: 80.0,
            hunger_critical: 95.0,
            exhaustion_critical: 95.0,
            duty_per_task: 20.0,
            max_queued_actions: 32,
            claim_ttl_ticks: 30,
        }
    }
}

impl PlannerConfig {
    /// Facility category a recipe runs at; recipes without one use the workstation.
    pub fn station_for<'a>(&'a self, recipe: &'a Recipe) -> &'a str {
        recipe.facility_or(&self.workstation_category)
    }
}

// ---------------------------------------------------------------------------
// API errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AgentNotFound,
    TaskNotFound,
    SnapshotMissing,
    InvalidRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn capabilities_are_normalized_on_deserialize() {
        let agent: EntityState = serde_json::from_value(json!({
            "name": "Farmer",
            "category": "Agent",
            "kind": "agent",
            "capabilities": ["CanFarm", " canfarm ", "CANCOOK"]
        }))
        .expect("agent parses");

        assert_eq!(agent.capabilities.len(), 2);
        assert!(agent.capabilities.contains(&Capability::new("canFarm")));
        assert!(agent.capabilities.contains(&Capability::new("cancook")));
    }

    #[test]
    fn inventory_keys_accept_stringified_item_ids() {
        let storage: EntityState = serde_json::from_value(json!({
            "name": "Storage",
            "category": "Storage",
            "inventory": { "1001": 100, "2003": 2 }
        }))
        .expect("storage parses");

        assert_eq!(storage.kind, EntityKind::Facility);
        assert_eq!(storage.stock(1001), 100);
        assert_eq!(storage.stock(2003), 2);
        assert_eq!(storage.stock(9999), 0);
    }

    #[test]
    fn default_configuration_is_complete() {
        let cfg = PlannerConfig::default();
        assert!(cfg.produce_priority > cfg.transport_priority);
        assert!(cfg.meal_batch > 0);
        assert!(cfg.max_queued_actions > 0);
        assert!(cfg.hunger_critical >= cfg.hunger_high);
        assert!(cfg.exhaustion_critical >= cfg.exhaustion_high);
    }

    #[test]
    fn recipes_without_a_category_run_at_the_workstation() {
        let cfg = PlannerConfig {
            workstation_category: "Bench".to_string(),
            ..PlannerConfig::default()
        };
        let recipe: Recipe = serde_json::from_value(json!({
            "recipe_id": 7,
            "product_id": 70,
            "ingredients": [{ "item_id": 1, "count": 2 }]
        }))
        .expect("recipe without category");
        assert_eq!(cfg.station_for(&recipe), "Bench");

        let stove = Recipe {
            facility_category: "Stove".to_string(),
            ..recipe
        };
        assert_eq!(cfg.station_for(&stove), "Stove");
    }

    #[test]
    fn partial_configuration_falls_back_to_defaults() {
        let cfg: PlannerConfig =
            serde_json::from_value(json!({ "meal_batch": 5 })).expect("partial config");
        assert_eq!(cfg.meal_batch, 5);
        assert_eq!(cfg.food_item_id, PlannerConfig::default().food_item_id);
    }
}
