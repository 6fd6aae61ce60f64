//! Tool routing, query orchestration and session lifecycle for Switchboard.

mod lifecycle;
mod orchestrator;
mod registry;

pub use lifecycle::{SessionFuture, run_with_cleanup};
pub use orchestrator::{MAX_TOOL_ROUNDS, Orchestrator, QueryError};
pub use registry::ToolRegistry;
