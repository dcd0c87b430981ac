//! Recursive supply-chain synthesis.
//!
//! `ensure` makes sure a facility will end up holding some amount of an item:
//! either by asking for it to be hauled in from elsewhere, or, when the world
//! does not hold enough, by posting production and recursing into the recipe.

use contracts::{
    Goal, ItemId, PlannerConfig, Selector, TaskDraft, TaskId, TaskKind, TaskMetadata, TaskOrigin,
    WorldSnapshot,
};
use tracing::{debug, warn};

use crate::blackboard::{supplies, TaskStore};
use crate::catalog::RecipeCatalog;
use crate::goal;

pub struct SupplyChain<'a> {
    board: &'a TaskStore,
    catalog: &'a RecipeCatalog,
    config: &'a PlannerConfig,
}

impl<'a> SupplyChain<'a> {
    pub fn new(board: &'a TaskStore, catalog: &'a RecipeCatalog, config: &'a PlannerConfig) -> Self {
        Self {
            board,
            catalog,
            config,
        }
    }

    /// Ensure `facility` will hold at least `amount` of `item_id`.
    ///
    /// Returns the id of the task now responsible for it, or `None` when the
    /// facility already holds enough or nothing could be posted.
    pub fn ensure(
        &self,
        item_id: ItemId,
        amount: i64,
        facility: &str,
        snapshot: &WorldSnapshot,
    ) -> Option<TaskId> {
        let mut chain = Vec::new();
        self.ensure_inner(item_id, amount, facility, snapshot, &mut chain)
    }

    fn ensure_inner(
        &self,
        item_id: ItemId,
        amount: i64,
        facility: &str,
        snapshot: &WorldSnapshot,
        chain: &mut Vec<ItemId>,
    ) -> Option<TaskId> {
        if let Some(existing) = self.board.find_supply(item_id, facility) {
            debug!(item_id, facility, task_id = %existing, "supply already arranged");
            return Some(existing);
        }
        if goal::local_stock(snapshot, facility, item_id) >= amount {
            return None;
        }
        if chain.contains(&item_id) {
            warn!(item_id, ?chain, "recipe cycle detected; not recursing");
            return None;
        }

        let elsewhere = goal::global_stock(snapshot, item_id, Some(facility));
        if elsewhere < amount {
            self.post_production(item_id, amount, facility, snapshot, chain)
        } else {
            Some(self.post_transport(item_id, amount, facility, snapshot))
        }
    }

    fn post_production(
        &self,
        item_id: ItemId,
        amount: i64,
        facility: &str,
        snapshot: &WorldSnapshot,
        chain: &mut Vec<ItemId>,
    ) -> Option<TaskId> {
        let name = self.catalog.item_name(item_id);
        let recipe = self.catalog.recipe_for(item_id);
        let preconditions = recipe
            .map(|recipe| {
                recipe
                    .ingredients
                    .iter()
                    .map(|ing| Goal::stock_at_least(Selector::Global, ing.item_id, ing.count))
                    .collect()
            })
            .unwrap_or_default();

        let draft = TaskDraft {
            kind: TaskKind::Produce,
            description: format!("Produce {name} x{amount} (for {facility})"),
            goal: Goal::stock_at_least(Selector::Global, item_id, amount),
            preconditions,
            priority: self.config.produce_priority,
            required_capability: recipe.and_then(|recipe| recipe.required_capability.clone()),
            metadata: Some(TaskMetadata {
                item_id,
                source: None,
                destination: Some(facility.to_string()),
                quantity: amount,
            }),
            origin: TaskOrigin::Synthesizer,
        };
        let task_id = self
            .board
            .post_unless(draft, |task| supplies(task, item_id, facility));

        let Some(recipe) = recipe else {
            debug!(item_id, "raw material; production task has no recipe to expand");
            return Some(task_id);
        };
        let category = self.config.station_for(recipe);
        let Some(workshop) = goal::find_facility(snapshot, category, None) else {
            warn!(
                item_id,
                category,
                "no facility can produce item; ingredients not synthesized"
            );
            return Some(task_id);
        };

        chain.push(item_id);
        for ingredient in &recipe.ingredients {
            self.ensure_inner(
                ingredient.item_id,
                ingredient.count.saturating_mul(amount),
                &workshop.name,
                snapshot,
                chain,
            );
        }
        chain.pop();

        Some(task_id)
    }

    fn post_transport(
        &self,
        item_id: ItemId,
        amount: i64,
        facility: &str,
        snapshot: &WorldSnapshot,
    ) -> TaskId {
        let name = self.catalog.item_name(item_id);
        let source = goal::find_holder(
            snapshot,
            item_id,
            1,
            Some(facility),
            &self.config.storage_category,
        )
        .map(|holder| holder.name.clone());

        let draft = TaskDraft {
            kind: TaskKind::Transport,
            description: format!("Transport {name} x{amount} to {facility}"),
            goal: Goal::stock_at_least(Selector::named(facility), item_id, amount),
            preconditions: vec![Goal::stock_at_least(Selector::Global, item_id, 1).excluding(facility)],
            priority: self.config.transport_priority,
            required_capability: None,
            metadata: Some(TaskMetadata {
                item_id,
                source,
                destination: Some(facility.to_string()),
                quantity: amount,
            }),
            origin: TaskOrigin::Synthesizer,
        };
        self.board
            .post_unless(draft, |task| supplies(task, item_id, facility))
    }
}
