mod context;
mod orchestrator;
mod stage;

pub use context::SessionContext;
pub use orchestrator::{ReportOutcome, WorkflowConfig, WorkflowOrchestrator};
pub use stage::{CostMode, Stage};
