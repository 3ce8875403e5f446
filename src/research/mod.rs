//! Research orchestration
//!
//! - [`coordinator`]: the run state machine and the [`run`] entry point
//! - [`supervisor`]: delegation planning and bounded fan-out
//! - [`researcher`]: the per-topic tool loop
//! - [`compression`]: condensing a researcher's conversation
//! - [`report`]: the report synthesis ladder
//! - [`scoping`]: clarification and brief parsing
//! - [`state`]: the data model shared by the stages

pub mod compression;
pub mod coordinator;
pub mod prompts;
pub mod report;
pub mod researcher;
pub mod scoping;
pub mod state;
pub mod supervisor;

pub use compression::{Compressor, COMPRESSION_FAILED};
pub use coordinator::{run, ResearchCoordinator, Transition, WorkflowState};
pub use report::{static_fallback, ReportInput, ReportWriter};
pub use researcher::Researcher;
pub use state::{RunResult, RunState, StatePatch, TaskResult};
pub use supervisor::{overflow_rejection, Supervisor, SupervisorOutcome};
