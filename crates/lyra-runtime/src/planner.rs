//! Question to plan.
//!
//! Planning never fails a run: when the model is unreachable or its reply
//! is unusable, the plan falls back to the accessions named in the question.

use async_trait::async_trait;
use lyra_core::analysis::parse_json_reply;
use lyra_core::{extract_accessions, Plan};
use serde_json::Value;
use tracing::{info, warn};

use crate::prompts::PLANNER_PROMPT;
use crate::providers::LlmClient;

/// Maps a research question to a [`Plan`].
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, question: &str) -> Plan;
}

/// Plans from the accession-shaped tokens in the question alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessionPlanner;

impl AccessionPlanner {
    pub fn plan_for(question: &str) -> Plan {
        let units = extract_accessions(question);
        Plan::new(units.iter().map(|u| u.as_str().to_string()), true)
    }
}

#[async_trait]
impl Planner for AccessionPlanner {
    async fn plan(&self, question: &str) -> Plan {
        Self::plan_for(question)
    }
}

/// Asks the model for a plan, falling back to [`AccessionPlanner`].
#[derive(Debug)]
pub struct LlmPlanner {
    llm: LlmClient,
}

impl LlmPlanner {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, question: &str) -> Plan {
        let reply = match self.llm.ask(PLANNER_PROMPT, question).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Planner call failed, extracting accessions from the question");
                return AccessionPlanner::plan_for(question);
            }
        };

        let plan = parse_json_reply(&reply)
            .map_err(|e| e.to_string())
            .and_then(|map| Plan::from_value(Value::Object(map)).map_err(|e| e.to_string()));
        match plan {
            Ok(plan) => {
                info!(
                    units = plan.uniprot_ids.len(),
                    full_pipeline = plan.requires_full_pipeline,
                    "Plan created"
                );
                plan
            }
            Err(e) => {
                warn!(error = %e, "Planner reply unusable, extracting accessions from the question");
                AccessionPlanner::plan_for(question)
            }
        }
    }
}
