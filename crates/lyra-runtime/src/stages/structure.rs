use async_trait::async_trait;
use lyra_core::analysis::{PredictionMetadata, StructureAnalysis};
use lyra_core::{FailureKind, Stage, StageFailure, StageResult};
use tracing::{debug, warn};

use super::{to_payload, StageAgent, StageContext};
use crate::sources::AlphaFoldClient;

/// Per-residue confidence analysis, with a metadata-only fallback.
pub struct StructureAgent {
    alphafold: AlphaFoldClient,
}

impl StructureAgent {
    pub fn new(alphafold: AlphaFoldClient) -> Self {
        Self { alphafold }
    }

    /// Metadata from the `Fetch` output, else a (cached) lookup.
    async fn metadata(&self, ctx: &StageContext) -> Result<PredictionMetadata, StageFailure> {
        let from_fetch = ctx
            .output(Stage::Fetch)
            .and_then(|summary| summary.get("metadata"))
            .and_then(|m| serde_json::from_value(m.clone()).ok());
        if let Some(metadata) = from_fetch {
            return Ok(metadata);
        }

        self.alphafold.prediction(&ctx.unit).await?.ok_or_else(|| {
            StageFailure::payload(
                FailureKind::NotFound,
                format!("Protein {} not found in AlphaFold", ctx.unit),
            )
        })
    }
}

#[async_trait]
impl StageAgent for StructureAgent {
    fn stage(&self) -> Stage {
        Stage::AnalyzeStructure
    }

    async fn run(&self, ctx: &StageContext) -> StageResult {
        let unit = &ctx.unit;
        let metadata = self.metadata(ctx).await?;

        let scores = match metadata.plddt_doc_url.as_deref() {
            Some(url) => match self.alphafold.confidence_scores(url).await {
                Ok(scores) => scores,
                Err(e) => {
                    warn!(unit = %unit, error = %e, "Per-residue scores unavailable, using summary");
                    None
                }
            },
            None => None,
        };

        let analysis = match scores {
            Some(scores) => StructureAnalysis::per_residue(unit, &metadata, &scores),
            None => StructureAnalysis::summary_only(unit, &metadata),
        };
        debug!(
            unit = %unit,
            overall = ?analysis.overall_confidence(),
            target_regions = analysis.target_regions().len(),
            "Structure analysed"
        );
        to_payload(&analysis)
    }
}
