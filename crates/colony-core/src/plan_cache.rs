//! Per-agent queues of compiled actions and their validation.
//!
//! A queue is only trusted one step at a time: before an action leaves the
//! cache it is checked against the current snapshot, and a stale head drops
//! the whole remaining plan.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ActionKind, Intent, ItemId, PlanView, PlannedAction, WorldSnapshot};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Staleness {
    #[error("agent {0} is not in the snapshot")]
    AgentMissing(String),
    #[error("target {0} no longer exists")]
    TargetMissing(String),
    #[error("{action} has no target")]
    NoTarget { action: String },
    #[error("{holder} holds {have} of item {item_id}, need {need}")]
    SourceShort {
        holder: String,
        item_id: ItemId,
        have: i64,
        need: i64,
    },
    #[error("agent carries {have} of item {item_id}, need {need}")]
    CarryShort { item_id: ItemId, have: i64, need: i64 },
}

/// Check one cached action against the current world.
pub fn validate(
    action: &PlannedAction,
    agent_id: &str,
    snapshot: &WorldSnapshot,
) -> Result<(), Staleness> {
    let target = || {
        action.target_name().ok_or_else(|| Staleness::NoTarget {
            action: action.to_string(),
        })
    };
    let need = i64::from(action.quantity.max(1));

    match action.kind {
        ActionKind::Wait => Ok(()),
        ActionKind::Use if action.target.is_none() => Ok(()),
        ActionKind::Move | ActionKind::Use => {
            let target = target()?;
            if snapshot.contains(target) {
                Ok(())
            } else {
                Err(Staleness::TargetMissing(target.to_string()))
            }
        }
        ActionKind::Take => {
            let source = target()?;
            let holder = snapshot
                .entity(source)
                .ok_or_else(|| Staleness::TargetMissing(source.to_string()))?;
            let item_id = action.item_id.unwrap_or_default();
            let have = holder.stock(item_id);
            if have >= need {
                Ok(())
            } else {
                Err(Staleness::SourceShort {
                    holder: source.to_string(),
                    item_id,
                    have,
                    need,
                })
            }
        }
        ActionKind::Put => {
            let destination = target()?;
            if !snapshot.contains(destination) {
                return Err(Staleness::TargetMissing(destination.to_string()));
            }
            let agent = snapshot
                .agent(agent_id)
                .ok_or_else(|| Staleness::AgentMissing(agent_id.to_string()))?;
            let item_id = action.item_id.unwrap_or_default();
            let have = agent.stock(item_id);
            if have >= need {
                Ok(())
            } else {
                Err(Staleness::CarryShort { item_id, have, need })
            }
        }
    }
}

/// Remaining steps of one agent's current plan plus the last failure note.
#[derive(Debug, Default)]
pub struct AgentPlan {
    queue: VecDeque<PlannedAction>,
    intent: Option<Intent>,
    feedback: Option<String>,
}

impl AgentPlan {
    pub fn front(&self) -> Option<&PlannedAction> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<PlannedAction> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    /// Drop the queue; returns how many actions were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.intent = None;
        dropped
    }

    pub fn replace(&mut self, actions: impl IntoIterator<Item = PlannedAction>, intent: Intent) {
        self.queue = actions.into_iter().collect();
        self.intent = (!self.queue.is_empty()).then_some(intent);
    }

    pub fn set_feedback(&mut self, note: impl Into<String>) {
        self.feedback = Some(note.into());
    }

    pub fn take_feedback(&mut self) -> Option<String> {
        self.feedback.take()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn view(&self, agent_id: &str) -> PlanView {
        PlanView {
            agent_id: agent_id.to_string(),
            intent: self.intent.clone(),
            queued: self.queue.iter().cloned().collect(),
            feedback: self.feedback.clone(),
        }
    }
}

/// Agent id -> plan. Each plan has its own lock so agents never wait on one
/// another once their slot exists.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: Mutex<BTreeMap<String, Arc<Mutex<AgentPlan>>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, BTreeMap<String, Arc<Mutex<AgentPlan>>>> {
        self.plans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn slot(&self, agent_id: &str) -> Arc<Mutex<AgentPlan>> {
        Arc::clone(self.slots().entry(agent_id.to_string()).or_default())
    }

    pub fn remaining(&self, agent_id: &str) -> usize {
        let Some(slot) = self.slots().get(agent_id).cloned() else {
            return 0;
        };
        let plan = lock_plan(&slot);
        plan.len()
    }

    /// `None` until the agent has made its first request.
    pub fn view(&self, agent_id: &str) -> Option<PlanView> {
        let slot = self.slots().get(agent_id).cloned()?;
        let plan = lock_plan(&slot);
        Some(plan.view(agent_id))
    }

    /// Drop an agent's queued actions.
    pub fn clear(&self, agent_id: &str) -> usize {
        let Some(slot) = self.slots().get(agent_id).cloned() else {
            return 0;
        };
        let dropped = lock_plan(&slot).clear();
        if dropped > 0 {
            debug!(agent_id, dropped, "cleared cached plan");
        }
        dropped
    }
}

pub fn lock_plan(slot: &Mutex<AgentPlan>) -> MutexGuard<'_, AgentPlan> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
