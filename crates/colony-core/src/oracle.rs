//! Decision oracles: who picks the next intent when the plan cache is empty.
//!
//! The kernel only needs `(command, params)` back; an oracle may be a rule
//! table, a utility scorer, or a remote model. [`RuleOracle`] is the built-in
//! fallback driven by agent needs and board pressure.

use contracts::{EntityState, Intent, PlannerConfig, Task, WorldSnapshot};
use serde_json::Value;

/// Everything an oracle may look at for one decision.
#[derive(Debug, Clone, Copy)]
pub struct OracleContext<'a> {
    pub agent: &'a EntityState,
    pub snapshot: &'a WorldSnapshot,
    /// Tasks this agent could act on right now, highest priority first.
    pub executable_tasks: &'a [Task],
    /// Note from the last failed compile, if any.
    pub feedback: Option<&'a str>,
}

/// Raw decision as an oracle reports it. Parsed into an [`Intent`] by the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub command: String,
    pub params: Value,
    pub reasoning: String,
}

impl Decision {
    pub fn new(command: impl Into<String>, params: Value, reasoning: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params,
            reasoning: reasoning.into(),
        }
    }

    pub fn from_intent(intent: &Intent, reasoning: impl Into<String>) -> Self {
        Self {
            command: intent.name().to_string(),
            params: serde_json::to_value(intent).unwrap_or(Value::Null),
            reasoning: reasoning.into(),
        }
    }
}

pub trait IntentOracle: Send + Sync {
    fn decide(&self, ctx: &OracleContext<'_>) -> Decision;
}

/// Need levels on a 0..=100 scale, higher is more urgent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Desires {
    pub hunger: f64,
    pub exhaustion: f64,
    pub duty: f64,
}

impl Desires {
    /// Hunger and exhaustion invert the satiety and energy stats (missing
    /// stats read as fully satisfied); duty grows with executable work.
    pub fn assess(agent: &EntityState, executable: usize, config: &PlannerConfig) -> Self {
        let deficit = |key: &str| (100.0 - agent.number(key).unwrap_or(100.0)).clamp(0.0, 100.0);
        Self {
            hunger: deficit(&config.satiety_attribute),
            exhaustion: deficit(&config.energy_attribute),
            duty: (executable as f64 * config.duty_per_task).min(100.0),
        }
    }

    /// The intent that answers a critical need, exhaustion before hunger.
    pub fn critical_need(&self, config: &PlannerConfig) -> Option<Intent> {
        if self.exhaustion >= config.exhaustion_critical {
            Some(Intent::Sleep)
        } else if self.hunger >= config.hunger_critical {
            Some(Intent::Eat)
        } else {
            None
        }
    }
}

/// Needs first, then the board, then idle.
#[derive(Debug, Clone, Default)]
pub struct RuleOracle {
    config: PlannerConfig,
}

impl RuleOracle {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }
}

impl IntentOracle for RuleOracle {
    fn decide(&self, ctx: &OracleContext<'_>) -> Decision {
        let desires = Desires::assess(ctx.agent, ctx.executable_tasks.len(), &self.config);

        if desires.exhaustion >= self.config.exhaustion_high {
            return Decision::from_intent(
                &Intent::Sleep,
                format!("exhaustion {:.0}", desires.exhaustion),
            );
        }
        if desires.hunger >= self.config.hunger_high {
            return Decision::from_intent(&Intent::Eat, format!("hunger {:.0}", desires.hunger));
        }
        if let Some(task) = ctx.executable_tasks.first() {
            return Decision::from_intent(
                &Intent::CheckBoard,
                format!("duty {:.0}; top task {}", desires.duty, task.description),
            );
        }
        Decision::from_intent(
            &Intent::Wait {
                minutes: self.config.idle_wait_minutes,
            },
            "nothing to do",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Goal, Selector, TaskKind, TaskOrigin, TaskStatus};
    use serde_json::json;

    fn task() -> Task {
        Task {
            task_id: "task:1".to_string(),
            kind: TaskKind::Transport,
            description: "haul".to_string(),
            goal: Goal::stock_at_least(Selector::named("Bench"), 1, 1),
            preconditions: Vec::new(),
            priority: 5,
            required_capability: None,
            metadata: None,
            origin: TaskOrigin::External,
            status: TaskStatus::Open,
        }
    }

    fn decide(agent: EntityState, tasks: &[Task]) -> Intent {
        let snapshot = WorldSnapshot::new(vec![agent.clone()]);
        let decision = RuleOracle::default().decide(&OracleContext {
            agent: &agent,
            snapshot: &snapshot,
            executable_tasks: tasks,
            feedback: None,
        });
        Intent::from_parts(&decision.command, &decision.params).expect("rule oracle emits valid intents")
    }

    #[test]
    fn needs_come_before_duty() {
        let tired = EntityState::agent("a").with_attribute("energy", json!(10.0));
        assert_eq!(decide(tired, &[task()]), Intent::Sleep);

        let hungry = EntityState::agent("a").with_attribute("hunger", json!(20));
        assert_eq!(decide(hungry, &[task()]), Intent::Eat);

        let fine = EntityState::agent("a")
            .with_attribute("hunger", json!(90))
            .with_attribute("energy", json!(90));
        assert_eq!(decide(fine.clone(), &[task()]), Intent::CheckBoard);
        assert_eq!(decide(fine, &[]), Intent::Wait { minutes: 10 });
    }

    #[test]
    fn desires_scale_and_clamp() {
        let config = PlannerConfig::default();
        let agent = EntityState::agent("a").with_attribute("hunger", json!(3));
        let desires = Desires::assess(&agent, 9, &config);
        assert_eq!(desires.hunger, 97.0);
        assert_eq!(desires.exhaustion, 0.0);
        assert_eq!(desires.duty, 100.0);
        assert_eq!(desires.critical_need(&config), Some(Intent::Eat));

        let spent = agent.with_attribute("energy", json!(0));
        let desires = Desires::assess(&spent, 0, &config);
        assert_eq!(desires.critical_need(&config), Some(Intent::Sleep));

        let rested = EntityState::agent("a");
        assert_eq!(Desires::assess(&rested, 0, &config).critical_need(&config), None);
    }
}
