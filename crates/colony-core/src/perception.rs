//! Turns facility state into blackboard work.
//!
//! Runs once per tick after retirement. Chambers waiting for seeds or ready
//! for harvest become farming tasks; queued work orders on workstations become
//! craft tasks plus supply for their ingredients. Posting is idempotent, so a
//! facility that stays in the same state does not grow the board.

use contracts::{
    Capability, Comparator, EntityState, Goal, PlannerConfig, Selector, TaskDraft, TaskId,
    TaskKind, TaskMetadata, TaskOrigin, WorldSnapshot,
};
use serde_json::Value;
use tracing::debug;

use crate::blackboard::TaskStore;
use crate::catalog::RecipeCatalog;
use crate::goal;
use crate::supply::SupplyChain;

pub struct PerceptionScan<'a> {
    board: &'a TaskStore,
    catalog: &'a RecipeCatalog,
    config: &'a PlannerConfig,
}

impl<'a> PerceptionScan<'a> {
    pub fn new(board: &'a TaskStore, catalog: &'a RecipeCatalog, config: &'a PlannerConfig) -> Self {
        Self {
            board,
            catalog,
            config,
        }
    }

    /// Scan every facility; returns ids of tasks posted or re-confirmed.
    pub fn scan(&self, snapshot: &WorldSnapshot) -> Vec<TaskId> {
        let mut posted = Vec::new();
        for facility in snapshot.facilities() {
            if facility
                .category
                .starts_with(self.config.cultivation_category.as_str())
            {
                posted.extend(self.scan_chamber(facility));
            }
            posted.extend(self.scan_work_orders(facility, snapshot));
        }
        posted
    }

    fn scan_chamber(&self, chamber: &EntityState) -> Option<TaskId> {
        let phase = goal::attribute_text(chamber, &self.config.phase_attribute)?;
        let (kind, verb) = if phase.ends_with(self.config.waiting_to_plant_phase.as_str()) {
            (TaskKind::Plant, "Plant")
        } else if phase.ends_with(self.config.ready_to_harvest_phase.as_str()) {
            (TaskKind::Harvest, "Harvest")
        } else {
            return None;
        };

        // Done once the chamber has moved past the phase we saw.
        let draft = TaskDraft {
            kind,
            description: format!("{verb} at {}", chamber.name),
            goal: Goal::new(
                Selector::named(&chamber.name),
                self.config.phase_attribute.as_str(),
                Comparator::Ne,
                phase,
            ),
            preconditions: Vec::new(),
            priority: self.config.farming_priority,
            required_capability: Some(Capability::new(&self.config.farming_capability)),
            metadata: None,
            origin: TaskOrigin::Perception,
        };
        Some(self.board.post(draft))
    }

    fn scan_work_orders(&self, facility: &EntityState, snapshot: &WorldSnapshot) -> Vec<TaskId> {
        let Some(Value::Object(orders)) = facility.attributes.get(&self.config.task_list_attribute)
        else {
            return Vec::new();
        };

        let supply = SupplyChain::new(self.board, self.catalog, self.config);
        let mut posted = Vec::new();
        for (key, count) in orders {
            let count = count.as_i64().unwrap_or(0);
            if count <= 0 {
                continue;
            }
            let Some(recipe) = key
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|recipe_id| self.catalog.recipe_by_id(recipe_id))
            else {
                debug!(facility = %facility.name, order = %key, "work order for unknown recipe");
                continue;
            };

            let product = self.catalog.item_name(recipe.product_id);
            let draft = TaskDraft {
                kind: TaskKind::Craft,
                description: format!("Craft {product} x{count} at {}", facility.name),
                goal: Goal::new(
                    Selector::named(&facility.name),
                    format!("{}.{key}", self.config.task_list_attribute),
                    Comparator::Le,
                    0,
                ),
                preconditions: recipe
                    .ingredients
                    .iter()
                    .map(|ing| Goal::stock_at_least(Selector::named(&facility.name), ing.item_id, ing.count))
                    .collect(),
                priority: self.config.craft_priority,
                required_capability: Some(
                    recipe
                        .required_capability
                        .clone()
                        .unwrap_or_else(|| Capability::new(&self.config.crafting_capability)),
                ),
                metadata: Some(TaskMetadata {
                    item_id: recipe.product_id,
                    source: None,
                    destination: Some(facility.name.clone()),
                    quantity: count,
                }),
                origin: TaskOrigin::Perception,
            };
            posted.push(self.board.post(draft));

            for ingredient in &recipe.ingredients {
                supply.ensure(
                    ingredient.item_id,
                    ingredient.count.saturating_mul(count),
                    &facility.name,
                    snapshot,
                );
            }
        }
        posted
    }
}
