//! Shared task blackboard.
//!
//! Tasks carry a completion goal and optional precondition goals. The store
//! deduplicates on goal identity, retires tasks whose goal already holds, and
//! answers "what can this agent do right now". All operations go through one
//! mutex so that concurrent agents see a consistent board.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    BoardSummary, Capability, ItemId, Task, TaskDraft, TaskId, TaskKind, TaskStatus, TaskView,
    WorldSnapshot,
};
use tracing::{debug, info};

use crate::goal;

#[derive(Debug, Default)]
pub struct TaskStore {
    board: Mutex<Board>,
}

#[derive(Debug, Default)]
struct Board {
    tasks: Vec<Task>,
    next_id: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Post a task unless one with the same goal is already on the board, in
    /// which case the existing id comes back.
    pub fn post(&self, draft: TaskDraft) -> TaskId {
        self.post_unless(draft, |_| false)
    }

    /// Like [`TaskStore::post`], but also returns the id of the first task for
    /// which `existing` holds. Lookup and insert happen under one lock.
    pub fn post_unless(&self, draft: TaskDraft, existing: impl Fn(&Task) -> bool) -> TaskId {
        let mut board = self.lock();
        if let Some(task) = board
            .tasks
            .iter()
            .find(|task| task.goal.same_target(&draft.goal) || existing(task))
        {
            debug!(task_id = %task.task_id, goal = %draft.goal, "task already on the board");
            return task.task_id.clone();
        }

        board.next_id += 1;
        let task_id = format!("task:{}", board.next_id);
        info!(
            task_id = %task_id,
            kind = ?draft.kind,
            priority = draft.priority,
            goal = %draft.goal,
            "posted task: {}",
            draft.description
        );
        board.tasks.push(Task::from_draft(task_id.clone(), draft));
        task_id
    }

    /// Remove every task whose goal holds in `snapshot` and return them.
    pub fn retire(&self, snapshot: &WorldSnapshot) -> Vec<Task> {
        let mut board = self.lock();
        let (done, live): (Vec<Task>, Vec<Task>) = std::mem::take(&mut board.tasks)
            .into_iter()
            .partition(|task| goal::evaluate(&task.goal, snapshot));
        board.tasks = live;
        for task in &done {
            info!(task_id = %task.task_id, goal = %task.goal, "retired task: {}", task.description);
        }
        done
    }

    pub fn cancel(&self, task_id: &str) -> Option<Task> {
        let mut board = self.lock();
        let idx = board.tasks.iter().position(|task| task.task_id == task_id)?;
        let task = board.tasks.remove(idx);
        info!(task_id = %task.task_id, "cancelled task");
        Some(task)
    }

    /// Tasks this agent may act on now, in insertion order: unclaimed or
    /// claimed by this agent, capability held, every precondition satisfied.
    pub fn executable(
        &self,
        capabilities: &BTreeSet<Capability>,
        agent_id: &str,
        snapshot: &WorldSnapshot,
    ) -> Vec<Task> {
        self.lock()
            .tasks
            .iter()
            .filter(|task| task.claimed_by().map_or(true, |owner| owner == agent_id))
            .filter(|task| {
                task.required_capability
                    .as_ref()
                    .map_or(true, |capability| capabilities.contains(capability))
            })
            .filter(|task| goal::all_hold(&task.preconditions, snapshot))
            .cloned()
            .collect()
    }

    /// Claim a task for an agent at `tick`. Fails when it is gone or held by
    /// someone else.
    pub fn claim(&self, task_id: &str, agent_id: &str, tick: u64) -> bool {
        let mut board = self.lock();
        let Some(task) = board.tasks.iter_mut().find(|task| task.task_id == task_id) else {
            return false;
        };
        match task.claimed_by() {
            Some(owner) if owner != agent_id => false,
            _ => {
                task.status = TaskStatus::Claimed {
                    agent_id: agent_id.to_string(),
                    since_tick: tick,
                };
                debug!(task_id, agent_id, tick, "claimed task");
                true
            }
        }
    }

    /// Reopen every task claimed by `agent_id`; returns how many were released.
    pub fn release_claims(&self, agent_id: &str) -> usize {
        let mut board = self.lock();
        let mut released = 0;
        for task in board
            .tasks
            .iter_mut()
            .filter(|task| task.claimed_by() == Some(agent_id))
        {
            task.status = TaskStatus::Open;
            released += 1;
        }
        if released > 0 {
            debug!(agent_id, released, "released claims");
        }
        released
    }

    /// Mark the agent's claims as still in use at `tick`.
    pub fn renew_claims(&self, agent_id: &str, tick: u64) {
        let mut board = self.lock();
        for task in board.tasks.iter_mut() {
            if let TaskStatus::Claimed {
                agent_id: owner,
                since_tick,
            } = &mut task.status
            {
                if owner.as_str() == agent_id {
                    *since_tick = (*since_tick).max(tick);
                }
            }
        }
    }

    /// Reopen claims whose holder is no longer an agent in `snapshot`, or
    /// that have not been renewed for more than `ttl` ticks. A `ttl` of zero
    /// keeps idle claims forever.
    pub fn expire_claims(&self, snapshot: &WorldSnapshot, ttl: u64) -> Vec<TaskId> {
        let present = snapshot
            .agents()
            .map(|agent| agent.name.as_str())
            .collect::<BTreeSet<_>>();
        let mut board = self.lock();
        let mut reopened = Vec::new();
        for task in board.tasks.iter_mut() {
            let TaskStatus::Claimed {
                agent_id,
                since_tick,
            } = &task.status
            else {
                continue;
            };
            let idle = snapshot.tick.saturating_sub(*since_tick);
            let gone = !present.contains(agent_id.as_str());
            if gone || (ttl > 0 && idle > ttl) {
                info!(
                    task_id = %task.task_id,
                    agent_id = %agent_id,
                    idle,
                    gone,
                    "claim expired; task reopened"
                );
                task.status = TaskStatus::Open;
                reopened.push(task.task_id.clone());
            }
        }
        reopened
    }

    /// A produce or transport task already routing `item_id` into `destination`.
    pub fn find_supply(&self, item_id: ItemId, destination: &str) -> Option<TaskId> {
        self.lock()
            .tasks
            .iter()
            .find(|task| supplies(task, item_id, destination))
            .map(|task| task.task_id.clone())
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.lock()
            .tasks
            .iter()
            .find(|task| task.task_id == task_id)
            .cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self, snapshot: &WorldSnapshot) -> BoardSummary {
        let board = self.lock();
        let tasks = board
            .tasks
            .iter()
            .map(|task| TaskView {
                task_id: task.task_id.clone(),
                kind: task.kind,
                description: task.description.clone(),
                priority: task.priority,
                required_capability: task.required_capability.clone(),
                status: task.status.clone(),
                goal: task.goal.to_string(),
                current: goal::current_value(&task.goal, snapshot),
                expected: task.goal.expected.to_string(),
                preconditions_met: goal::all_hold(&task.preconditions, snapshot),
            })
            .collect::<Vec<_>>();
        let claimed = tasks
            .iter()
            .filter(|view| matches!(view.status, TaskStatus::Claimed { .. }))
            .count();
        BoardSummary {
            total: tasks.len(),
            open: tasks.len() - claimed,
            claimed,
            tasks,
        }
    }
}

/// Supply signature: same item routed into the same facility.
pub(crate) fn supplies(task: &Task, item_id: ItemId, destination: &str) -> bool {
    matches!(task.kind, TaskKind::Produce | TaskKind::Transport)
        && task.metadata.as_ref().is_some_and(|meta| {
            meta.item_id == item_id && meta.destination.as_deref() == Some(destination)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EntityState, Goal, Selector, TaskMetadata, TaskOrigin};

    fn draft(goal: Goal) -> TaskDraft {
        TaskDraft {
            kind: TaskKind::Transport,
            description: "move cotton".to_string(),
            goal,
            preconditions: Vec::new(),
            priority: 5,
            required_capability: None,
            metadata: Some(TaskMetadata {
                item_id: 1001,
                source: None,
                destination: Some("WorkStation".to_string()),
                quantity: 10,
            }),
            origin: TaskOrigin::Synthesizer,
        }
    }

    fn world(workstation_cotton: i64) -> WorldSnapshot {
        WorldSnapshot::new(vec![
            EntityState::facility("Storage", "Storage").with_item(1001, 100),
            EntityState::facility("WorkStation", "WorkStation").with_item(1001, workstation_cotton),
        ])
    }

    #[test]
    fn posting_the_same_goal_twice_returns_the_same_id() {
        let store = TaskStore::new();
        let goal = Goal::stock_at_least(Selector::named("WorkStation"), 1001, 10);
        let first = store.post(draft(goal.clone()));
        let second = store.post(draft(goal.excluding("Storage")));
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(first, "task:1");
    }

    #[test]
    fn retire_removes_only_satisfied_tasks() {
        let store = TaskStore::new();
        let done = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 5)));
        let open = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 50)));

        let retired = store.retire(&world(10));
        assert_eq!(retired.iter().map(|t| t.task_id.as_str()).collect::<Vec<_>>(), vec![done.as_str()]);
        assert!(store.get(&open).is_some());
        assert!(store.get(&done).is_none());
    }

    #[test]
    fn executable_filters_on_capability_claims_and_preconditions() {
        let store = TaskStore::new();
        let mut gated = draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 50));
        gated.preconditions = vec![Goal::stock_at_least(Selector::named("WorkStation"), 1001, 1)];
        let gated = store.post(gated);

        let mut skilled = draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 60));
        skilled.required_capability = Some(Capability::new("CanCraft"));
        let skilled = store.post(skilled);

        let none = BTreeSet::new();
        let crafter = BTreeSet::from([Capability::new("cancraft")]);

        assert!(store.executable(&none, "alice", &world(0)).is_empty());
        let ids = |tasks: Vec<Task>| tasks.into_iter().map(|t| t.task_id).collect::<Vec<_>>();
        assert_eq!(ids(store.executable(&none, "alice", &world(1))), vec![gated.clone()]);
        assert_eq!(
            ids(store.executable(&crafter, "alice", &world(1))),
            vec![gated.clone(), skilled.clone()]
        );

        assert!(store.claim(&gated, "bob", 0));
        assert!(!store.claim(&gated, "alice", 0));
        assert_eq!(ids(store.executable(&crafter, "alice", &world(1))), vec![skilled]);
        assert_eq!(store.executable(&none, "bob", &world(1)).len(), 1);

        assert_eq!(store.release_claims("bob"), 1);
        assert!(store.claim(&gated, "alice", 0));
    }

    fn world_at(tick: u64, agents: &[&str]) -> WorldSnapshot {
        let mut snapshot = world(0);
        snapshot.tick = tick;
        snapshot
            .entities
            .extend(agents.iter().map(|name| EntityState::agent(*name)));
        snapshot
    }

    #[test]
    fn claims_of_departed_agents_reopen() {
        let store = TaskStore::new();
        let id = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 10)));
        assert!(store.claim(&id, "bob", 5));

        assert!(store.expire_claims(&world_at(6, &["alice", "bob"]), 30).is_empty());
        assert_eq!(store.expire_claims(&world_at(7, &["alice"]), 30), vec![id.clone()]);
        assert_eq!(store.get(&id).map(|task| task.status), Some(TaskStatus::Open));
        assert!(store.claim(&id, "alice", 7));
    }

    #[test]
    fn idle_claims_expire_after_the_ttl_unless_renewed() {
        let store = TaskStore::new();
        let id = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 10)));
        store.claim(&id, "bob", 10);

        assert!(store.expire_claims(&world_at(40, &["bob"]), 30).is_empty());
        store.renew_claims("bob", 40);
        assert!(store.expire_claims(&world_at(70, &["bob"]), 30).is_empty());
        assert!(store.expire_claims(&world_at(500, &["bob"]), 0).is_empty());
        assert_eq!(store.expire_claims(&world_at(71, &["bob"]), 30), vec![id.clone()]);
        assert_eq!(store.get(&id).and_then(|task| task.claimed_by().map(str::to_string)), None);
    }

    #[test]
    fn supply_signature_matches_item_and_destination() {
        let store = TaskStore::new();
        let id = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 10)));
        assert_eq!(store.find_supply(1001, "WorkStation"), Some(id));
        assert_eq!(store.find_supply(1001, "Stove"), None);
        assert_eq!(store.find_supply(1002, "WorkStation"), None);
    }

    #[test]
    fn cancel_removes_the_task() {
        let store = TaskStore::new();
        let id = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 10)));
        assert!(store.cancel(&id).is_some());
        assert!(store.cancel(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn summary_reports_progress() {
        let store = TaskStore::new();
        let id = store.post(draft(Goal::stock_at_least(Selector::named("WorkStation"), 1001, 10)));
        store.claim(&id, "alice", 0);
        let summary = store.summary(&world(4));
        assert_eq!(summary.total, 1);
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.open, 0);
        assert_eq!(summary.tasks[0].current.as_deref(), Some("4"));
        assert_eq!(summary.tasks[0].expected, "10");
    }
}
