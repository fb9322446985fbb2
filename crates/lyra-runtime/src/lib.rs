//! # lyra-runtime
//!
//! Async execution for the Lyra protein analysis pipeline.
//!
//! `lyra-core` decides what runs and how outcomes are classified. This crate
//! does the I/O around those decisions:
//!
//! - [`http`]: the resilient fetcher (per-class timeouts, retry with
//!   exponential backoff, in-run response cache)
//! - [`sources`]: AlphaFold and UniProt clients
//! - [`providers`]: LLM provider abstraction (Azure OpenAI) with usage
//!   accounting and secret handling
//! - [`stages`]: one agent per pipeline stage
//! - [`scheduler`]: per-unit execution under the skip cascade, with
//!   deadlines, panic capture and the plan adjustment hook
//! - [`orchestrator`]: plan → tasks → execute → aggregate
//!
//! ## Example
//!
//! ```rust,ignore
//! use lyra_runtime::{Lyra, RuntimeConfig};
//! use lyra_core::Plan;
//!
//! let config = RuntimeConfig::from_file("lyra.yaml")?.with_env_overrides();
//! let lyra = Lyra::from_config(config)?;
//!
//! let outcome = lyra.run_plan(&Plan::new(["Q8I3H7", "P04637"], true)).await;
//! println!("{}", lyra_core::render_report(&outcome.report));
//! ```

pub mod adjust;
pub mod config;
pub mod http;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod scheduler;
pub mod sources;
pub mod stages;

#[cfg(test)]
mod testing;

pub use adjust::{ConfidenceWatch, NoAdjustment, PlanAdjuster, TaskEvent};
pub use config::{ConfigError, ExecutionConfig, HttpConfig, LlmConfig, RuntimeConfig};
pub use http::{FetchError, ResilientFetcher};
pub use orchestrator::{Lyra, LyraBuilder, RunOutcome, RuntimeError};
pub use planner::{AccessionPlanner, LlmPlanner, Planner};
pub use providers::{LlmClient, LlmProvider, LlmUsage, ProviderError};
pub use resilience::{Deadline, RetryPolicy};
pub use scheduler::Scheduler;
pub use stages::{StageAgent, StageContext, StageRegistry};
