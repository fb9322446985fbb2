//! Stage agents: one per pipeline stage.
//!
//! An agent maps a unit plus the outputs of its earlier stages to a payload
//! or a [`StageFailure`]. Agents check their own preconditions before any
//! network call and report them in-band. Transport and provider errors are
//! returned as exceptions; the scheduler never sees a raw error type.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use lyra_core::{FailureKind, Stage, StageFailure, StageResult, WorkUnit};

use crate::providers::LlmClient;
use crate::sources::{AlphaFoldClient, UniProtClient};

mod critique;
mod fetch;
mod reason;
mod structure;
mod synthesize;

pub use critique::CritiqueAgent;
pub use fetch::FetchAgent;
pub use reason::ReasonAgent;
pub use structure::StructureAgent;
pub use synthesize::SynthesizeAgent;

/// Everything a stage may read about its unit.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub unit: WorkUnit,
    pub focus_areas: Vec<String>,
    outputs: BTreeMap<Stage, Value>,
}

impl StageContext {
    pub fn new(unit: WorkUnit, focus_areas: Vec<String>) -> Self {
        Self {
            unit,
            focus_areas,
            outputs: BTreeMap::new(),
        }
    }

    /// Output of an earlier stage, if it produced one.
    pub fn output(&self, stage: Stage) -> Option<&Value> {
        self.outputs.get(&stage)
    }

    pub fn insert(&mut self, stage: Stage, output: Value) {
        self.outputs.insert(stage, output);
    }

    /// Output of `stage`, or an in-band `MissingInput` failure.
    pub fn require(&self, stage: Stage) -> Result<&Value, StageFailure> {
        self.output(stage).ok_or_else(|| {
            StageFailure::payload(
                FailureKind::MissingInput,
                format!("{} output is required but unavailable for {}", stage, self.unit),
            )
        })
    }
}

/// One processing step.
#[async_trait]
pub trait StageAgent: Send + Sync {
    fn stage(&self) -> Stage;

    async fn run(&self, ctx: &StageContext) -> StageResult;
}

/// The agents a scheduler can dispatch to, one per stage.
#[derive(Clone, Default)]
pub struct StageRegistry {
    agents: BTreeMap<Stage, Arc<dyn StageAgent>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five production agents.
    pub fn standard(alphafold: AlphaFoldClient, uniprot: UniProtClient, llm: LlmClient) -> Self {
        Self::new()
            .with(FetchAgent::new(alphafold.clone()))
            .with(StructureAgent::new(alphafold))
            .with(ReasonAgent::new(llm.clone()))
            .with(CritiqueAgent::new(uniprot, llm.clone()))
            .with(SynthesizeAgent::new(llm))
    }

    /// Register an agent, replacing any agent for the same stage.
    pub fn with(mut self, agent: impl StageAgent + 'static) -> Self {
        self.register(Arc::new(agent));
        self
    }

    pub fn register(&mut self, agent: Arc<dyn StageAgent>) {
        self.agents.insert(agent.stage(), agent);
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageAgent>> {
        self.agents.get(&stage).cloned()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.agents.keys()).finish()
    }
}

pub(crate) fn to_payload<T: Serialize>(value: &T) -> StageResult {
    serde_json::to_value(value)
        .map_err(|e| StageFailure::exception(FailureKind::Internal, e.to_string()))
}

/// Pretty JSON for prompt context. `null` values render as "unavailable".
pub(crate) fn pretty(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "(unavailable)".to_string(),
        Some(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo(Stage);

    #[async_trait]
    impl StageAgent for Echo {
        fn stage(&self) -> Stage {
            self.0
        }

        async fn run(&self, ctx: &StageContext) -> StageResult {
            Ok(json!({"unit": ctx.unit.as_str()}))
        }
    }

    #[test]
    fn test_require_reports_missing_input() {
        let ctx = StageContext::new(WorkUnit::new("P69905"), vec![]);
        let failure = ctx.require(Stage::Fetch).unwrap_err();
        assert_eq!(failure.kind, FailureKind::MissingInput);
        assert_eq!(failure.origin, lyra_core::ErrorSource::PayloadError);
    }

    #[test]
    fn test_registry_replaces_by_stage() {
        let registry = StageRegistry::new()
            .with(Echo(Stage::Fetch))
            .with(Echo(Stage::Fetch))
            .with(Echo(Stage::Reason));
        assert!(registry.get(Stage::Fetch).is_some());
        assert!(registry.get(Stage::Synthesize).is_none());
        assert_eq!(format!("{:?}", registry), "[Fetch, Reason]");
    }

    #[test]
    fn test_pretty_marks_unavailable() {
        assert_eq!(pretty(None), "(unavailable)");
        assert_eq!(pretty(Some(&Value::Null)), "(unavailable)");
        assert!(pretty(Some(&json!({"a": 1}))).contains("\"a\": 1"));
    }
}
