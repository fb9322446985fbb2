//! # lyra-core
//!
//! Deterministic task model for the Lyra protein analysis pipeline.
//!
//! This crate answers, without doing any I/O:
//! - Which tasks does a plan expand into?
//! - Should the next task of a unit run, or be skipped?
//! - What is each unit's root cause, and which bucket does it land in?
//!
//! ## Key Guarantees
//!
//! 1. **One result per task**: every generated task gets exactly one `TaskResult`
//! 2. **Skip cascade**: a failed `Fetch` suppresses the rest of the unit
//! 3. **Degrade, don't fail**: a later failure still lets `Synthesize` run
//! 4. **Root cause is stable**: the first failure of a unit is never overwritten
//! 5. **Deterministic aggregation**: same inputs, same report
//!
//! ## Example
//!
//! ```rust,ignore
//! use lyra_core::{Aggregator, Plan, UnitTracker, Gate};
//!
//! let plan = Plan::from_json(r#"{"uniprot_ids": ["Q8I3H7"]}"#)?;
//! let mut tracker = UnitTracker::new();
//! let mut results = Vec::new();
//! for task in plan.build_tasks() {
//!     match tracker.gate(&task) {
//!         Gate::Run => results.push(tracker.record(task, run(&task), elapsed)),
//!         Gate::Skip { reason } => results.push(tracker.skip(task, reason)),
//!     }
//! }
//! let report = Aggregator::new().aggregate(&results, &plan.units());
//! ```

pub mod aggregator;
pub mod analysis;
pub mod failure;
pub mod plan;
pub mod render;
pub mod stage;
pub mod task;
pub mod tracker;
pub mod unit;

// Re-export main types at crate root
pub use aggregator::{
    AdditionalFailure, Aggregator, FailureReport, RunReport, SummaryCounts, UnitOutcome,
};
pub use failure::{check_payload, payload_error, ErrorSource, FailureKind, StageFailure, StageResult};
pub use plan::{AnalysisType, Plan, PlanError, SchemaViolation};
pub use render::render_report;
pub use stage::{PipelineDepth, Stage};
pub use task::{Task, TaskResult, TaskStatus};
pub use tracker::{Gate, UnitState, UnitTracker};
pub use unit::{extract_accessions, InvalidUnit, WorkUnit};
