//! The query-generation-and-repair pipeline.

pub mod orchestrator;
pub mod payload;
pub mod repair;
pub mod trace;

pub use orchestrator::{
    PipelineConfig, PipelineOrchestrator, PipelineResponse, ResponseResult, RunOutcome, RunReport,
    CONNECTION_FAILED_MESSAGE, REJECTION_PREFIX, REPAIR_EXHAUSTED_MESSAGE,
};
pub use payload::RowPayload;
pub use repair::RepairHistory;
pub use trace::{RunTrace, SqlCandidate, TracePayload, TraceStep};
