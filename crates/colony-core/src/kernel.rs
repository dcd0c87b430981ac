//! Per-tick and per-agent entry points.
//!
//! `begin_tick` runs once per snapshot (retire, expire claims, then
//! perceive). `next_action`
//! runs once per agent request: a valid cached step is returned as-is,
//! otherwise an intent is chosen and compiled, the first action returned and
//! the rest cached.

use std::collections::VecDeque;

use contracts::{
    ActionResponse, BoardSummary, Intent, PlanResult, PlannedAction, PlannerConfig, Task,
    TickReport, WorldSnapshot,
};
use tracing::{debug, info, warn};

use crate::blackboard::TaskStore;
use crate::catalog::RecipeCatalog;
use crate::compiler::ActionCompiler;
use crate::error::PlanError;
use crate::oracle::{Desires, IntentOracle, OracleContext};
use crate::perception::PerceptionScan;
use crate::plan_cache::{lock_plan, validate, AgentPlan, PlanCache};

#[derive(Debug, Default)]
pub struct Kernel {
    catalog: RecipeCatalog,
    config: PlannerConfig,
    board: TaskStore,
    plans: PlanCache,
}

impl Kernel {
    pub fn new(catalog: RecipeCatalog, config: PlannerConfig) -> Self {
        Self {
            catalog,
            config,
            board: TaskStore::new(),
            plans: PlanCache::new(),
        }
    }

    pub fn catalog(&self) -> &RecipeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn board(&self) -> &TaskStore {
        &self.board
    }

    pub fn plans(&self) -> &PlanCache {
        &self.plans
    }

    pub fn compiler(&self) -> ActionCompiler<'_> {
        ActionCompiler::new(&self.board, &self.catalog, &self.config)
    }

    /// Retire satisfied tasks, reopen abandoned claims, then turn facility
    /// state into new tasks.
    pub fn begin_tick(&self, snapshot: &WorldSnapshot) -> TickReport {
        let retired = self
            .board
            .retire(snapshot)
            .into_iter()
            .map(|task| task.task_id)
            .collect::<Vec<_>>();
        let reopened = self
            .board
            .expire_claims(snapshot, self.config.claim_ttl_ticks);
        let posted = PerceptionScan::new(&self.board, &self.catalog, &self.config).scan(snapshot);
        let report = TickReport {
            tick: snapshot.tick,
            retired,
            reopened,
            posted,
            active: self.board.len(),
        };
        debug!(
            tick = report.tick,
            retired = report.retired.len(),
            reopened = report.reopened.len(),
            perceived = report.posted.len(),
            active = report.active,
            "tick prepared"
        );
        report
    }

    /// Next action for an agent with a caller-chosen intent. The intent is
    /// only compiled when no valid cached step remains.
    pub fn next_action(
        &self,
        agent_id: &str,
        intent: Intent,
        snapshot: &WorldSnapshot,
    ) -> ActionResponse {
        self.step(agent_id, snapshot, |_| Ok(intent))
    }

    /// Next action for an agent, consulting `oracle` when the cache is empty.
    pub fn next_action_with(
        &self,
        agent_id: &str,
        oracle: &dyn IntentOracle,
        snapshot: &WorldSnapshot,
    ) -> ActionResponse {
        self.step(agent_id, snapshot, |plan| {
            let agent = snapshot
                .agent(agent_id)
                .ok_or_else(|| PlanError::MissingAgent {
                    agent_id: agent_id.to_string(),
                })?;
            let mut tasks = self
                .board
                .executable(&agent.capabilities, agent_id, snapshot);
            tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
            let feedback = plan.take_feedback();
            let decision = oracle.decide(&OracleContext {
                agent,
                snapshot,
                executable_tasks: &tasks,
                feedback: feedback.as_deref(),
            });
            debug!(
                agent_id,
                command = %decision.command,
                reasoning = %decision.reasoning,
                "oracle decision"
            );
            Ok(Intent::from_parts(&decision.command, &decision.params)?)
        })
    }

    /// Drop an agent's cached plan and give its claims back to the board.
    pub fn force_clear(&self, agent_id: &str) -> usize {
        let dropped = self.plans.clear(agent_id);
        self.board.release_claims(agent_id);
        info!(agent_id, dropped, "plan force-cleared");
        dropped
    }

    pub fn cancel_task(&self, task_id: &str) -> Option<Task> {
        self.board.cancel(task_id)
    }

    pub fn board_summary(&self, snapshot: &WorldSnapshot) -> BoardSummary {
        self.board.summary(snapshot)
    }

    fn step(
        &self,
        agent_id: &str,
        snapshot: &WorldSnapshot,
        choose: impl FnOnce(&mut AgentPlan) -> Result<Intent, PlanError>,
    ) -> ActionResponse {
        let slot = self.plans.slot(agent_id);
        let mut plan = lock_plan(&slot);

        self.clear_on_emergency(agent_id, snapshot, &mut plan);
        if let Some(response) = self.continue_plan(agent_id, snapshot, &mut plan) {
            return response;
        }

        self.board.release_claims(agent_id);
        let intent = match choose(&mut *plan) {
            Ok(intent) => intent,
            Err(err) => {
                let note = err.to_string();
                warn!(agent_id, error = %note, "no intent to compile");
                plan.set_feedback(note.clone());
                return ActionResponse {
                    agent_id: agent_id.to_string(),
                    action: PlannedAction::wait(err.wait_minutes(&self.config)),
                    ok: false,
                    note,
                    remaining_steps: 0,
                    from_cache: false,
                    intent: None,
                };
            }
        };

        let result = self.compiler().compile(agent_id, &intent, snapshot);
        self.commit(agent_id, intent, result, &mut plan)
    }

    fn continue_plan(
        &self,
        agent_id: &str,
        snapshot: &WorldSnapshot,
        plan: &mut AgentPlan,
    ) -> Option<ActionResponse> {
        let head = plan.front()?.clone();
        match validate(&head, agent_id, snapshot) {
            Ok(()) => {
                plan.pop();
                self.board.renew_claims(agent_id, snapshot.tick);
                Some(ActionResponse {
                    agent_id: agent_id.to_string(),
                    action: head,
                    ok: true,
                    note: "Continuing cached plan".to_string(),
                    remaining_steps: plan.len(),
                    from_cache: true,
                    intent: plan.intent().cloned(),
                })
            }
            Err(reason) => {
                let dropped = plan.clear();
                warn!(agent_id, %reason, dropped, "cached plan is stale; replanning");
                None
            }
        }
    }

    /// A critical need preempts any plan that is not already addressing it.
    fn clear_on_emergency(&self, agent_id: &str, snapshot: &WorldSnapshot, plan: &mut AgentPlan) {
        if plan.is_empty() {
            return;
        }
        let Some(agent) = snapshot.agent(agent_id) else {
            return;
        };
        let desires = Desires::assess(agent, 0, &self.config);
        let Some(need) = desires.critical_need(&self.config) else {
            return;
        };
        if plan.intent() != Some(&need) {
            let dropped = plan.clear();
            warn!(
                agent_id,
                need = need.name(),
                hunger = desires.hunger,
                exhaustion = desires.exhaustion,
                dropped,
                "critical need; plan cleared"
            );
        }
    }

    fn commit(
        &self,
        agent_id: &str,
        intent: Intent,
        result: PlanResult,
        plan: &mut AgentPlan,
    ) -> ActionResponse {
        let PlanResult { ok, actions, note } = result;
        let mut actions = VecDeque::from(actions);
        let action = actions
            .pop_front()
            .unwrap_or_else(|| PlannedAction::wait(self.config.fallback_wait_minutes));

        if ok {
            let cap = self.config.max_queued_actions;
            if actions.len() > cap {
                warn!(
                    agent_id,
                    dropped = actions.len() - cap,
                    cap,
                    "plan longer than the queue cap; tail dropped until the next compile"
                );
                actions.truncate(cap);
            }
            plan.replace(actions, intent.clone());
            info!(
                agent_id,
                intent = intent.name(),
                queued = plan.len(),
                "compiled plan: {note}"
            );
        } else {
            plan.clear();
            plan.set_feedback(format!("{} failed: {note}", intent.name()));
            info!(agent_id, intent = intent.name(), "compile failed: {note}");
        }

        ActionResponse {
            agent_id: agent_id.to_string(),
            action,
            ok,
            note,
            remaining_steps: plan.len(),
            from_cache: false,
            intent: Some(intent),
        }
    }
}
