//! Compiles an intent into a sequence of primitive actions.
//!
//! Each intent kind has its own routine. Routines track where the agent will
//! be standing as the plan unfolds, so a `Move` is only emitted when the next
//! step happens somewhere else. Missing materials are handed to the supply
//! chain and the compile fails with a short wait.

use contracts::{
    EntityState, Intent, ItemId, PlanResult, PlannedAction, PlannerConfig, Recipe, Task, TaskKind,
    WorldSnapshot,
};
use tracing::debug;

use crate::blackboard::TaskStore;
use crate::catalog::RecipeCatalog;
use crate::error::PlanError;
use crate::goal;
use crate::supply::SupplyChain;

/// Action list under construction plus the agent's projected location.
#[derive(Debug, Clone)]
struct Route {
    location: Option<String>,
    actions: Vec<PlannedAction>,
}

impl Route {
    fn starting_at(agent: &EntityState) -> Self {
        Self {
            location: agent.location.clone(),
            actions: Vec::new(),
        }
    }

    fn go(&mut self, target: &str) {
        if self.location.as_deref() != Some(target) {
            self.actions.push(PlannedAction::move_to(target));
            self.location = Some(target.to_string());
        }
    }

    fn push(&mut self, action: PlannedAction) {
        self.actions.push(action);
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

pub struct ActionCompiler<'a> {
    board: &'a TaskStore,
    catalog: &'a RecipeCatalog,
    config: &'a PlannerConfig,
}

impl<'a> ActionCompiler<'a> {
    pub fn new(board: &'a TaskStore, catalog: &'a RecipeCatalog, config: &'a PlannerConfig) -> Self {
        Self {
            board,
            catalog,
            config,
        }
    }

    fn supply(&self) -> SupplyChain<'a> {
        SupplyChain::new(self.board, self.catalog, self.config)
    }

    /// Compile an intent. Failures come back as a single `Wait` with a note.
    pub fn compile(&self, agent_id: &str, intent: &Intent, snapshot: &WorldSnapshot) -> PlanResult {
        match self.try_compile(agent_id, intent, snapshot) {
            Ok(result) => result,
            Err(err) => {
                debug!(agent_id, intent = intent.name(), error = %err, "compile failed");
                PlanResult::failure(err.wait_minutes(self.config), err.to_string())
            }
        }
    }

    pub fn try_compile(
        &self,
        agent_id: &str,
        intent: &Intent,
        snapshot: &WorldSnapshot,
    ) -> Result<PlanResult, PlanError> {
        let agent = snapshot
            .agent(agent_id)
            .ok_or_else(|| PlanError::MissingAgent {
                agent_id: agent_id.to_string(),
            })?;
        let route = Route::starting_at(agent);

        match intent {
            Intent::Eat => self.plan_eat(agent, snapshot, route),
            Intent::Sleep => self.plan_sleep(snapshot, route),
            Intent::Craft { product } => self.plan_craft(product, snapshot, route),
            Intent::Plant { target } => self.plan_farming(
                target.as_deref(),
                &self.config.waiting_to_plant_phase,
                "Planting",
                snapshot,
                route,
            ),
            Intent::Harvest { target } => self.plan_farming(
                target.as_deref(),
                &self.config.ready_to_harvest_phase,
                "Harvesting",
                snapshot,
                route,
            ),
            Intent::Transport {
                item_id,
                source,
                destination,
                quantity,
            } => self.plan_transport(*item_id, source, destination, *quantity, snapshot, route),
            Intent::Wait { minutes } => Ok(PlanResult::success(
                vec![PlannedAction::wait(*minutes)],
                format!("Waiting {minutes} minutes"),
            )),
            Intent::CheckBoard => self.plan_from_board(agent, snapshot, route),
        }
    }

    // -----------------------------------------------------------------------
    // Needs
    // -----------------------------------------------------------------------

    fn is_food(&self, item_id: ItemId) -> bool {
        item_id == self.config.food_item_id || self.catalog.is_food(item_id)
    }

    fn plan_eat(
        &self,
        agent: &EntityState,
        snapshot: &WorldSnapshot,
        mut route: Route,
    ) -> Result<PlanResult, PlanError> {
        if let Some((&food, _)) = agent
            .inventory
            .iter()
            .find(|(item_id, count)| **count > 0 && self.is_food(**item_id))
        {
            route.push(PlannedAction::use_item(food));
            return Ok(PlanResult::success(route.actions, "Eating carried food"));
        }

        let storage = &self.config.storage_category;
        let holder = goal::find_holder(snapshot, self.config.food_item_id, 1, None, storage)
            .map(|holder| (holder, self.config.food_item_id))
            .or_else(|| {
                self.catalog.food_items().find_map(|food| {
                    goal::find_holder(snapshot, food, 1, None, storage).map(|holder| (holder, food))
                })
            });

        if let Some((holder, food)) = holder {
            route.go(&holder.name);
            route.push(PlannedAction::take(&holder.name, food, 1));
            if let Some(table) =
                goal::find_facility(snapshot, &self.config.table_category, route.location())
            {
                route.go(&table.name);
            }
            route.push(PlannedAction::use_item(food));
            return Ok(PlanResult::success(
                route.actions,
                format!("Fetching {} from {}", self.catalog.item_name(food), holder.name),
            ));
        }

        let kitchen = self
            .catalog
            .recipe_for(self.config.food_item_id)
            .and_then(|recipe| {
                goal::find_facility(snapshot, self.config.station_for(recipe), None)
            })
            .or_else(|| goal::find_facility(snapshot, &self.config.stove_category, None))
            .ok_or_else(|| PlanError::MissingTarget {
                what: self.config.stove_category.clone(),
            })?;
        let task_id = self
            .supply()
            .ensure(
                self.config.food_item_id,
                self.config.meal_batch,
                &kitchen.name,
                snapshot,
            )
            .ok_or_else(|| PlanError::MissingTarget {
                what: "food".to_string(),
            })?;
        Err(PlanError::FoodUnavailable { task_id })
    }

    fn plan_sleep(&self, snapshot: &WorldSnapshot, mut route: Route) -> Result<PlanResult, PlanError> {
        let bed = goal::find_facility(snapshot, &self.config.bed_category, route.location())
            .ok_or_else(|| PlanError::MissingTarget {
                what: self.config.bed_category.clone(),
            })?;
        route.go(&bed.name);
        route.push(PlannedAction::use_facility(&bed.name));
        Ok(PlanResult::success(route.actions, format!("Sleeping at {}", bed.name)))
    }

    // -----------------------------------------------------------------------
    // Production
    // -----------------------------------------------------------------------

    fn plan_craft(
        &self,
        product: &str,
        snapshot: &WorldSnapshot,
        route: Route,
    ) -> Result<PlanResult, PlanError> {
        let product_id = self
            .catalog
            .item_id(product)
            .ok_or_else(|| PlanError::UnknownProduct {
                product: product.to_string(),
            })?;
        let recipe = self
            .catalog
            .recipe_for(product_id)
            .ok_or_else(|| PlanError::MissingRecipe {
                product: product.to_string(),
            })?;
        let category = self.config.station_for(recipe);
        let facility = goal::find_facility(snapshot, category, route.location())
            .ok_or_else(|| PlanError::MissingTarget {
                what: category.to_string(),
            })?;
        self.plan_recipe_at(recipe, &facility.name, snapshot, route)
    }

    /// Gather every ingredient into `facility`, then run the recipe there.
    fn plan_recipe_at(
        &self,
        recipe: &Recipe,
        facility: &str,
        snapshot: &WorldSnapshot,
        mut route: Route,
    ) -> Result<PlanResult, PlanError> {
        let mut missing = Vec::new();

        for ingredient in &recipe.ingredients {
            let shortfall = ingredient
                .count
                .saturating_sub(goal::local_stock(snapshot, facility, ingredient.item_id));
            if shortfall <= 0 {
                continue;
            }

            match goal::find_holder(
                snapshot,
                ingredient.item_id,
                shortfall,
                Some(facility),
                &self.config.storage_category,
            ) {
                Some(holder) => {
                    let quantity = u32::try_from(shortfall).unwrap_or(u32::MAX);
                    route.go(&holder.name);
                    route.push(PlannedAction::take(&holder.name, ingredient.item_id, quantity));
                    route.go(facility);
                    route.push(PlannedAction::put(facility, ingredient.item_id, quantity));
                }
                None => {
                    self.supply()
                        .ensure(ingredient.item_id, ingredient.count, facility, snapshot);
                    missing.push(self.catalog.item_name(ingredient.item_id));
                }
            }
        }

        if !missing.is_empty() {
            return Err(PlanError::ResourceShortfall { missing });
        }

        route.go(facility);
        route.push(PlannedAction::use_at(facility, recipe.recipe_id));
        Ok(PlanResult::success(
            route.actions,
            format!(
                "Crafting {} at {facility}",
                self.catalog.item_name(recipe.product_id)
            ),
        ))
    }

    fn plan_farming(
        &self,
        target: Option<&str>,
        phase: &str,
        verb: &str,
        snapshot: &WorldSnapshot,
        mut route: Route,
    ) -> Result<PlanResult, PlanError> {
        let chamber = match target {
            Some(name) => snapshot.entity(name),
            None => snapshot.facilities().find(|entity| {
                entity.category.starts_with(self.config.cultivation_category.as_str())
                    && goal::attribute_text(entity, &self.config.phase_attribute)
                        .is_some_and(|current| current.ends_with(phase))
            }),
        }
        .ok_or_else(|| PlanError::MissingTarget {
            what: target.map_or_else(|| format!("chamber in phase {phase}"), str::to_string),
        })?;

        route.go(&chamber.name);
        route.push(PlannedAction::use_facility(&chamber.name));
        Ok(PlanResult::success(route.actions, format!("{verb} at {}", chamber.name)))
    }

    fn plan_transport(
        &self,
        item_id: ItemId,
        source: &str,
        destination: &str,
        quantity: u32,
        snapshot: &WorldSnapshot,
        mut route: Route,
    ) -> Result<PlanResult, PlanError> {
        for end in [source, destination] {
            if !snapshot.contains(end) {
                return Err(PlanError::MissingTarget {
                    what: end.to_string(),
                });
            }
        }
        let quantity = quantity.max(1);
        route.go(source);
        route.push(PlannedAction::take(source, item_id, quantity));
        route.go(destination);
        route.push(PlannedAction::put(destination, item_id, quantity));
        Ok(PlanResult::success(
            route.actions,
            format!(
                "Hauling {} x{quantity} from {source} to {destination}",
                self.catalog.item_name(item_id)
            ),
        ))
    }

    // -----------------------------------------------------------------------
    // Blackboard
    // -----------------------------------------------------------------------

    /// Pick the highest-priority task this agent can compile and claim it.
    fn plan_from_board(
        &self,
        agent: &EntityState,
        snapshot: &WorldSnapshot,
        route: Route,
    ) -> Result<PlanResult, PlanError> {
        let mut tasks = self
            .board
            .executable(&agent.capabilities, &agent.name, snapshot);
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut last_error = None;
        for task in &tasks {
            match self.plan_task(task, snapshot, route.clone()) {
                Ok(result) => {
                    if !self.board.claim(&task.task_id, &agent.name, snapshot.tick) {
                        continue;
                    }
                    return Ok(PlanResult {
                        note: format!("[{}] {}", task.task_id, result.note),
                        ..result
                    });
                }
                Err(err) => {
                    debug!(task_id = %task.task_id, error = %err, "task not compilable for agent");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(PlanResult::success(
                vec![PlannedAction::wait(self.config.idle_wait_minutes)],
                "No executable tasks on the board",
            )),
        }
    }

    fn plan_task(
        &self,
        task: &Task,
        snapshot: &WorldSnapshot,
        route: Route,
    ) -> Result<PlanResult, PlanError> {
        let not_actionable = |reason: &str| PlanError::TaskNotActionable {
            task_id: task.task_id.clone(),
            reason: reason.to_string(),
        };

        match task.kind {
            TaskKind::Transport => {
                let meta = task.metadata.as_ref().ok_or_else(|| not_actionable("no metadata"))?;
                let destination = meta
                    .destination
                    .as_deref()
                    .ok_or_else(|| not_actionable("no destination"))?;
                let needed = meta
                    .quantity
                    .saturating_sub(goal::local_stock(snapshot, destination, meta.item_id));
                if needed <= 0 {
                    return Err(not_actionable("destination already stocked"));
                }
                let holder = goal::find_holder(
                    snapshot,
                    meta.item_id,
                    1,
                    Some(destination),
                    &self.config.storage_category,
                )
                .ok_or_else(|| not_actionable("nothing to haul"))?;
                let quantity = needed.min(holder.stock(meta.item_id));
                self.plan_transport(
                    meta.item_id,
                    &holder.name,
                    destination,
                    u32::try_from(quantity).unwrap_or(u32::MAX),
                    snapshot,
                    route,
                )
            }
            TaskKind::Produce => {
                let item_id = task.item_id().ok_or_else(|| not_actionable("no item"))?;
                let recipe = self
                    .catalog
                    .recipe_for(item_id)
                    .ok_or_else(|| not_actionable("no recipe"))?;
                let category = self.config.station_for(recipe);
                let facility = goal::find_facility(snapshot, category, route.location())
                    .ok_or_else(|| PlanError::MissingTarget {
                        what: category.to_string(),
                    })?;
                self.plan_recipe_at(recipe, &facility.name, snapshot, route)
            }
            TaskKind::Craft => {
                let item_id = task.item_id().ok_or_else(|| not_actionable("no item"))?;
                let recipe = self
                    .catalog
                    .recipe_for(item_id)
                    .ok_or_else(|| not_actionable("no recipe"))?;
                let facility = task
                    .destination()
                    .ok_or_else(|| not_actionable("no workstation"))?;
                self.plan_recipe_at(recipe, facility, snapshot, route)
            }
            TaskKind::Plant | TaskKind::Harvest => {
                let (phase, verb) = if task.kind == TaskKind::Plant {
                    (&self.config.waiting_to_plant_phase, "Planting")
                } else {
                    (&self.config.ready_to_harvest_phase, "Harvesting")
                };
                let chamber = task
                    .destination()
                    .ok_or_else(|| not_actionable("no chamber"))?;
                self.plan_farming(Some(chamber), phase, verb, snapshot, route)
            }
        }
    }
}
