use async_trait::async_trait;
use lyra_core::analysis::parse_or_raw;
use lyra_core::{Stage, StageResult};
use serde_json::{json, Value};
use tracing::info;

use super::{StageAgent, StageContext};
use crate::prompts::{reflection_prompt, REASONING_PROMPT};
use crate::providers::LlmClient;

/// Reasoning pass followed by a self-reflection pass.
pub struct ReasonAgent {
    llm: LlmClient,
}

impl ReasonAgent {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "Unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

fn format_regions(regions: Option<&Value>) -> String {
    let lines: Vec<String> = regions
        .and_then(Value::as_array)
        .map(|regions| {
            regions
                .iter()
                .take(5)
                .map(|r| {
                    format!(
                        "- Residues {}-{} ({} aa): {} suitability",
                        field(r, "start"),
                        field(r, "end"),
                        field(r, "length"),
                        field(r, "suitability")
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    if lines.is_empty() {
        "No high-confidence target regions identified.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Evidence block handed to the reasoning prompt.
fn evidence(ctx: &StageContext, summary: &Value, structure: Option<&Value>) -> String {
    let overall = structure
        .and_then(|s| s.get("overall_confidence"))
        .and_then(Value::as_f64)
        .map(|c| format!("{:.1}", c))
        .unwrap_or_else(|| "N/A".to_string());
    let interpretation = structure
        .and_then(|s| s.get("interpretation"))
        .and_then(Value::as_str)
        .unwrap_or("N/A");

    let mut context = format!(
        "PROTEIN DATA:\n\
         - UniProt ID: {}\n\
         - Description: {}\n\
         - Organism: {}\n\
         - Gene: {}\n\
         - Length: {} residues\n\n\
         STRUCTURE ANALYSIS:\n\
         - Overall confidence: {}/100\n\
         - Interpretation: {}\n\n\
         POTENTIAL TARGET REGIONS:\n{}\n\n\
         INITIAL ASSESSMENT: {}\n",
        ctx.unit,
        field(summary, "description"),
        field(summary, "organism"),
        field(summary, "gene"),
        field(summary, "length"),
        overall,
        interpretation,
        format_regions(structure.and_then(|s| s.get("drug_target_regions"))),
        field(summary, "drug_target_assessment"),
    );
    if !ctx.focus_areas.is_empty() {
        context.push_str(&format!("\nFOCUS AREAS: {}\n", ctx.focus_areas.join(", ")));
    }
    context
}

#[async_trait]
impl StageAgent for ReasonAgent {
    fn stage(&self) -> Stage {
        Stage::Reason
    }

    async fn run(&self, ctx: &StageContext) -> StageResult {
        let summary = ctx.require(Stage::Fetch)?;
        let structure = ctx.output(Stage::AnalyzeStructure);

        let user = format!(
            "Analyze this protein as a potential drug target:\n{}",
            evidence(ctx, summary, structure)
        );
        let reply = self.llm.ask(REASONING_PROMPT, &user).await?;
        info!(unit = %ctx.unit, chars = reply.len(), "Reasoning reply received");
        let reasoning = parse_or_raw(&reply, "raw_reasoning");

        let rendered = serde_json::to_string_pretty(&reasoning).unwrap_or_else(|_| reasoning.to_string());
        let reply = self
            .llm
            .ask(&reflection_prompt(&rendered), "Reflect on the above reasoning.")
            .await?;
        info!(unit = %ctx.unit, chars = reply.len(), "Reflection reply received");
        let reflection = parse_or_raw(&reply, "raw_reflection");

        Ok(json!({
            "uniprot_id": ctx.unit,
            "protein_summary": summary,
            "structure_analysis": {
                "overall_confidence": structure.and_then(|s| s.get("overall_confidence")),
                "drug_target_regions": structure
                    .and_then(|s| s.get("drug_target_regions"))
                    .cloned()
                    .unwrap_or_else(|| json!([])),
            },
            "reasoning": reasoning,
            "self_reflection": reflection,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CompletionConfig;
    use crate::testing::MockProvider;
    use lyra_core::{ErrorSource, FailureKind, WorkUnit};
    use std::sync::Arc;

    fn ctx() -> StageContext {
        let mut ctx = StageContext::new(WorkUnit::new("Q8I3H7"), vec!["druggability".to_string()]);
        ctx.insert(
            Stage::Fetch,
            json!({"description": "Apical membrane antigen 1", "organism": "Plasmodium falciparum",
                   "gene": "AMA1", "length": 622, "drug_target_assessment": "HIGH - Reliable structure, good candidate for analysis"}),
        );
        ctx.insert(
            Stage::AnalyzeStructure,
            json!({"overall_confidence": 82.5, "interpretation": "mostly ordered",
                   "drug_target_regions": [{"start": 1, "end": 25, "length": 25, "suitability": "excellent"}]}),
        );
        ctx
    }

    fn agent(provider: MockProvider) -> (ReasonAgent, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let llm = LlmClient::new(provider.clone(), CompletionConfig::default());
        (ReasonAgent::new(llm), provider)
    }

    #[tokio::test]
    async fn test_reasoning_and_reflection() {
        let (agent, provider) = agent(
            MockProvider::new("{}")
                .reply("viable drug target", r#"```json
{"overall_assessment": "HIGH", "confidence_in_assessment": 0.8}
```"#)
                .reply("Reasoning under review", r#"{"revised_confidence": 0.7}"#),
        );
        let payload = agent.run(&ctx()).await.unwrap();

        assert_eq!(payload["reasoning"]["overall_assessment"], "HIGH");
        assert_eq!(payload["self_reflection"]["revised_confidence"], 0.7);
        assert_eq!(payload["structure_analysis"]["overall_confidence"], 82.5);
        assert_eq!(provider.call_count(), 2);

        let prompts = provider.prompts();
        let user = &prompts[0][1].content;
        assert!(user.contains("- Residues 1-25 (25 aa): excellent suitability"));
        assert!(user.contains("FOCUS AREAS: druggability"));
        assert!(prompts[1][0].content.contains("\"overall_assessment\": \"HIGH\""));
    }

    #[tokio::test]
    async fn test_malformed_replies_degrade_to_raw_text() {
        let (agent, _) = agent(MockProvider::new("I think it is promising."));
        let payload = agent.run(&ctx()).await.unwrap();

        assert_eq!(payload["reasoning"]["raw_reasoning"], "I think it is promising.");
        assert_eq!(payload["self_reflection"]["raw_reflection"], "I think it is promising.");
    }

    #[tokio::test]
    async fn test_missing_fetch_output_is_in_band() {
        let (agent, provider) = agent(MockProvider::new("{}"));
        let ctx = StageContext::new(WorkUnit::new("Q8I3H7"), vec![]);
        let failure = agent.run(&ctx).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::MissingInput);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_is_exception() {
        let (agent, _) = agent(MockProvider::new("{}").fail("viable drug target", "quota exhausted"));
        let failure = agent.run(&ctx()).await.unwrap_err();
        assert_eq!(failure.origin, ErrorSource::Exception);
        assert_eq!(failure.kind, FailureKind::Provider);
    }
}
