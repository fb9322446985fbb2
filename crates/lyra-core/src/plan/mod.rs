//! Plan parsing and validation.
//!
//! A plan is the structured answer of the planner: a list of identifiers and
//! a pipeline-depth flag. Plans are validated against JSON Schema before they
//! are expanded into tasks.

mod parser;
mod schema;

pub use parser::{AnalysisType, Plan, PlanError};
pub use schema::{validate_plan_schema, SchemaViolation};
