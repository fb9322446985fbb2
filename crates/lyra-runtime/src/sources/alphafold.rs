//! AlphaFold DB prediction API.

use lyra_core::analysis::{extract_scores, PredictionMetadata};
use lyra_core::WorkUnit;
use serde_json::Value;

use crate::http::{classes, FetchError, HttpRequest, ResilientFetcher};

#[derive(Debug, Clone)]
pub struct AlphaFoldClient {
    fetcher: ResilientFetcher,
    base_url: String,
}

impl AlphaFoldClient {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn prediction_url(&self, unit: &WorkUnit) -> String {
        format!("{}/prediction/{}", self.base_url, unit)
    }

    /// Prediction metadata for `unit`, or `None` if AlphaFold has no model.
    ///
    /// The API answers with a list of models; the first one is used.
    pub async fn prediction(&self, unit: &WorkUnit) -> Result<Option<PredictionMetadata>, FetchError> {
        let url = self.prediction_url(unit);
        let body = match self
            .fetcher
            .get_json(&HttpRequest::get(&url), classes::ALPHAFOLD_METADATA)
            .await
        {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entry = match body {
            Value::Array(mut items) => {
                if items.is_empty() {
                    return Ok(None);
                }
                items.swap_remove(0)
            }
            other => other,
        };

        serde_json::from_value(entry)
            .map(Some)
            .map_err(|e| FetchError::Decode {
                url,
                message: e.to_string(),
            })
    }

    /// Per-residue pLDDT scores from a confidence document URL.
    ///
    /// `Ok(None)` when the document holds no usable scores.
    pub async fn confidence_scores(&self, url: &str) -> Result<Option<Vec<f64>>, FetchError> {
        let document = self
            .fetcher
            .get_json(&HttpRequest::get(url), classes::ALPHAFOLD_STRUCTURE)
            .await?;
        Ok(extract_scores(&document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: &Arc<MockTransport>) -> AlphaFoldClient {
        let fetcher = ResilientFetcher::with_transport(transport.clone(), HttpConfig::default());
        AlphaFoldClient::new(fetcher, "https://alphafold.ebi.ac.uk/api/")
    }

    #[tokio::test]
    async fn test_first_model_is_used() {
        let transport = Arc::new(MockTransport::new().json(
            "prediction/P69905",
            json!([
                {"entryId": "AF-P69905-F1", "globalMetricValue": 97.1, "sequenceEnd": 142},
                {"entryId": "AF-P69905-F2"}
            ]),
        ));
        let metadata = client(&transport)
            .prediction(&WorkUnit::new("P69905"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metadata.entry_id.as_deref(), Some("AF-P69905-F1"));
        assert_eq!(metadata.sequence_end, Some(142));
        assert_eq!(
            transport.calls()[0].request.url,
            "https://alphafold.ebi.ac.uk/api/prediction/P69905"
        );
    }

    #[tokio::test]
    async fn test_404_and_empty_list_are_none() {
        let transport = Arc::new(
            MockTransport::new()
                .status("prediction/P00000", 404)
                .json("prediction/Q00001", json!([])),
        );
        let client = client(&transport);
        assert!(client.prediction(&WorkUnit::new("P00000")).await.unwrap().is_none());
        assert!(client.prediction(&WorkUnit::new("Q00001")).await.unwrap().is_none());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scores_from_document() {
        let transport = Arc::new(MockTransport::new().json(
            "confidence",
            json!({"residueNumber": [1, 2, 3], "confidenceScore": [91.2, 88.0, 45.5]}),
        ));
        let scores = client(&transport)
            .confidence_scores("https://alphafold.ebi.ac.uk/files/AF-P69905-F1-confidence_v4.json")
            .await
            .unwrap();
        assert_eq!(scores, Some(vec![91.2, 88.0, 45.5]));
    }
}
