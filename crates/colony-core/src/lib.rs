//! Goal-driven task blackboard and action planner for colony agents.
//!
//! A caller hands in a [`contracts::WorldSnapshot`] once per tick and asks,
//! per agent, for the next primitive action. Between those two calls the
//! kernel keeps a shared blackboard of goal-carrying tasks, synthesizes
//! supply chains for missing materials, and caches compiled plans.

pub mod blackboard;
pub mod catalog;
pub mod compiler;
pub mod error;
pub mod goal;
pub mod kernel;
pub mod oracle;
pub mod perception;
pub mod plan_cache;
pub mod supply;

pub use blackboard::TaskStore;
pub use catalog::{CatalogError, RecipeCatalog};
pub use compiler::ActionCompiler;
pub use error::PlanError;
pub use kernel::Kernel;
pub use oracle::{Decision, Desires, IntentOracle, OracleContext, RuleOracle};
pub use perception::PerceptionScan;
pub use plan_cache::{validate, AgentPlan, PlanCache, Staleness};
pub use supply::SupplyChain;
