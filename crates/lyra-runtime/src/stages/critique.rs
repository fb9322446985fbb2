use async_trait::async_trait;
use lyra_core::analysis::parse_or_raw;
use lyra_core::{Stage, StageResult};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{pretty, StageAgent, StageContext};
use crate::prompts::CRITIC_PROMPT;
use crate::providers::LlmClient;
use crate::sources::UniProtClient;

const ANNOTATIONS_UNAVAILABLE: &str = "UniProt data unavailable for cross-reference.";

/// Challenges the reasoning against UniProt annotations.
///
/// Missing annotations weaken the critique but never fail it.
pub struct CritiqueAgent {
    uniprot: UniProtClient,
    llm: LlmClient,
}

impl CritiqueAgent {
    pub fn new(uniprot: UniProtClient, llm: LlmClient) -> Self {
        Self { uniprot, llm }
    }
}

#[async_trait]
impl StageAgent for CritiqueAgent {
    fn stage(&self) -> Stage {
        Stage::Critique
    }

    async fn run(&self, ctx: &StageContext) -> StageResult {
        let reasoning = ctx.require(Stage::Reason)?.get("reasoning");

        let annotations = match self.uniprot.annotations(&ctx.unit).await {
            Ok(Some(annotations)) => Some(annotations),
            Ok(None) => {
                warn!(unit = %ctx.unit, "UniProt has no entry, critiquing without annotations");
                None
            }
            Err(e) => {
                warn!(unit = %ctx.unit, error = %e, "UniProt fetch failed, critiquing without annotations");
                None
            }
        };
        let evidence = annotations
            .as_ref()
            .map(|a| a.to_context())
            .unwrap_or_else(|| ANNOTATIONS_UNAVAILABLE.to_string());

        let user = format!(
            "REASONING UNDER REVIEW:\n{}\n\nEXTERNAL EVIDENCE:\n{}\n\n\
             Critique the reasoning above. Are the conclusions supported by the evidence?",
            pretty(reasoning),
            evidence
        );
        let reply = self.llm.ask(CRITIC_PROMPT, &user).await?;
        info!(unit = %ctx.unit, chars = reply.len(), "Critique reply received");

        Ok(json!({
            "uniprot_id": ctx.unit,
            "critique": parse_or_raw(&reply, "raw_critique"),
            "uniprot_annotations": annotations.map_or(Value::Null, |a| json!(a)),
        }))
    }
}
