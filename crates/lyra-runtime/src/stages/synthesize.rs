use async_trait::async_trait;
use lyra_core::analysis::parse_or_raw;
use lyra_core::{Stage, StageResult};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{pretty, StageAgent, StageContext};
use crate::prompts::SYNTHESIS_PROMPT;
use crate::providers::LlmClient;

/// Stages whose output feeds the brief.
const INPUTS: [Stage; 4] = [
    Stage::Fetch,
    Stage::AnalyzeStructure,
    Stage::Reason,
    Stage::Critique,
];

/// Writes the final brief from whatever earlier stages produced.
///
/// Runs for degraded units too, so every input is optional. Missing inputs
/// are named in `degraded_inputs` and shown to the model as unavailable.
pub struct SynthesizeAgent {
    llm: LlmClient,
}

impl SynthesizeAgent {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

fn nested<'a>(ctx: &'a StageContext, stage: Stage, key: &str) -> Option<&'a Value> {
    ctx.output(stage).and_then(|v| v.get(key))
}

fn context(ctx: &StageContext) -> String {
    format!(
        "PROTEIN SUMMARY:\n{}\n\n\
         STRUCTURE ANALYSIS:\n{}\n\n\
         REASONING:\n{}\n\n\
         SELF-REFLECTION:\n{}\n\n\
         CRITIQUE:\n{}\n\n\
         UNIPROT ANNOTATIONS:\n{}\n",
        pretty(ctx.output(Stage::Fetch)),
        pretty(ctx.output(Stage::AnalyzeStructure)),
        pretty(nested(ctx, Stage::Reason, "reasoning")),
        pretty(nested(ctx, Stage::Reason, "self_reflection")),
        pretty(nested(ctx, Stage::Critique, "critique")),
        pretty(nested(ctx, Stage::Critique, "uniprot_annotations")),
    )
}

#[async_trait]
impl StageAgent for SynthesizeAgent {
    fn stage(&self) -> Stage {
        Stage::Synthesize
    }

    async fn run(&self, ctx: &StageContext) -> StageResult {
        let degraded: Vec<&str> = INPUTS
            .iter()
            .filter(|stage| ctx.output(**stage).is_none())
            .map(Stage::as_str)
            .collect();
        if !degraded.is_empty() {
            warn!(unit = %ctx.unit, missing = ?degraded, "Synthesizing from partial inputs");
        }

        let user = format!(
            "Synthesize a research brief for protein {}:\n\n{}",
            ctx.unit,
            context(ctx)
        );
        let reply = self.llm.ask(SYNTHESIS_PROMPT, &user).await?;
        info!(unit = %ctx.unit, chars = reply.len(), "Synthesis reply received");

        Ok(json!({
            "uniprot_id": ctx.unit,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "synthesis": parse_or_raw(&reply, "raw_synthesis"),
            "degraded_inputs": degraded,
        }))
    }
}
