//! HTTP binding for the colony planner: snapshot ingestion, per-agent action requests, and board control.

mod config;
mod server;

pub use config::{load_catalog, ConfigError, ServiceConfig};
pub use server::{router, serve, AppState, ServerError};
