use async_trait::async_trait;
use lyra_core::analysis::ProteinSummary;
use lyra_core::{FailureKind, Stage, StageFailure, StageResult};
use tracing::debug;

use super::{to_payload, StageAgent, StageContext};
use crate::sources::AlphaFoldClient;

/// Validates the accession and summarises its AlphaFold prediction.
pub struct FetchAgent {
    alphafold: AlphaFoldClient,
}

impl FetchAgent {
    pub fn new(alphafold: AlphaFoldClient) -> Self {
        Self { alphafold }
    }
}

#[async_trait]
impl StageAgent for FetchAgent {
    fn stage(&self) -> Stage {
        Stage::Fetch
    }

    async fn run(&self, ctx: &StageContext) -> StageResult {
        let unit = &ctx.unit;
        unit.validate()
            .map_err(|e| StageFailure::payload(FailureKind::Validation, e.to_string()))?;

        let metadata = self.alphafold.prediction(unit).await?.ok_or_else(|| {
            StageFailure::payload(
                FailureKind::NotFound,
                format!("Protein {} not found in AlphaFold", unit),
            )
        })?;

        let summary = ProteinSummary::from_metadata(unit, metadata);
        debug!(
            unit = %unit,
            overall = summary.confidence.overall,
            assessment = %summary.drug_target_assessment,
            "Fetched prediction summary"
        );
        to_payload(&summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::http::{HttpResponse, ResilientFetcher};
    use crate::stages::fixtures;
    use crate::testing::MockTransport;
    use lyra_core::{ErrorSource, WorkUnit};
    use std::sync::Arc;

    fn agent(transport: &Arc<MockTransport>) -> FetchAgent {
        let fetcher = ResilientFetcher::with_transport(transport.clone(), HttpConfig::default());
        FetchAgent::new(AlphaFoldClient::new(fetcher, "https://alphafold.ebi.ac.uk/api"))
    }

    fn ctx(id: &str) -> StageContext {
        StageContext::new(WorkUnit::new(id), vec![])
    }

    #[tokio::test]
    async fn test_summary_payload() {
        let transport = Arc::new(MockTransport::new().json("prediction/Q8I3H7", fixtures::prediction()));
        let payload = agent(&transport).run(&ctx(fixtures::UNIT)).await.unwrap();

        assert_eq!(payload["uniprot_id"], "Q8I3H7");
        assert_eq!(payload["gene"], "AMA1");
        assert_eq!(payload["length"], 622);
        assert_eq!(payload["confidence"]["overall"], 82.5);
        assert!(payload["drug_target_assessment"]
            .as_str()
            .unwrap()
            .starts_with("HIGH"));
        assert_eq!(
            payload["metadata"]["plddtDocUrl"],
            "https://alphafold.ebi.ac.uk/files/AF-Q8I3H7-F1-confidence_v4.json"
        );
    }

    #[tokio::test]
    async fn test_invalid_accession_makes_no_call() {
        let transport = Arc::new(MockTransport::new());
        let failure = agent(&transport).run(&ctx("NOT-AN-ID")).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Validation);
        assert_eq!(failure.origin, ErrorSource::PayloadError);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_in_band() {
        let transport = Arc::new(MockTransport::new().status("prediction/P12345", 404));
        let failure = agent(&transport).run(&ctx("P12345")).await.unwrap_err();

        assert_eq!(failure.origin, ErrorSource::PayloadError);
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert_eq!(failure.message, "Protein P12345 not found in AlphaFold");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_exception() {
        let transport = Arc::new(
            MockTransport::new().route("prediction/P12345", vec![Ok(HttpResponse::new(500, ""))]),
        );
        let failure = agent(&transport).run(&ctx("P12345")).await.unwrap_err();

        assert_eq!(failure.origin, ErrorSource::Exception);
        assert_eq!(failure.kind, FailureKind::Http);
        assert_eq!(transport.call_count(), 3);
    }
}
