//! Prediction metadata and the drug-target heuristic.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::unit::WorkUnit;

/// AlphaFold prediction metadata, as returned by `/prediction/{id}`.
///
/// Only the fields the pipeline reads are modelled. Every field is optional
/// because the upstream schema has drifted over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PredictionMetadata {
    #[serde(default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub uniprot_accession: Option<String>,
    #[serde(default)]
    pub uniprot_description: Option<String>,
    #[serde(default)]
    pub organism_scientific_name: Option<String>,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub sequence_end: Option<u32>,
    /// Mean pLDDT (0-100).
    #[serde(default)]
    pub global_metric_value: Option<f64>,
    #[serde(default)]
    pub fraction_plddt_very_high: Option<f64>,
    #[serde(default)]
    pub fraction_plddt_confident: Option<f64>,
    #[serde(default)]
    pub fraction_plddt_low: Option<f64>,
    #[serde(default)]
    pub fraction_plddt_very_low: Option<f64>,
    #[serde(default)]
    pub pdb_url: Option<String>,
    #[serde(default)]
    pub cif_url: Option<String>,
    /// Per-residue confidence document.
    #[serde(default)]
    pub plddt_doc_url: Option<String>,
}

impl PredictionMetadata {
    pub fn overall_confidence(&self) -> f64 {
        self.global_metric_value.unwrap_or(0.0)
    }

    pub fn very_high_fraction(&self) -> f64 {
        self.fraction_plddt_very_high.unwrap_or(0.0)
    }

    pub fn very_low_fraction(&self) -> f64 {
        self.fraction_plddt_very_low.unwrap_or(0.0)
    }
}

/// Coarse drug-target suitability from global structure confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrugTargetAssessment {
    High,
    Medium,
    Low,
}

impl DrugTargetAssessment {
    pub fn description(&self) -> &'static str {
        match self {
            Self::High => "HIGH - Reliable structure, good candidate for analysis",
            Self::Medium => "MEDIUM - Moderate confidence, proceed with caution",
            Self::Low => "LOW - Structure unreliable, not recommended",
        }
    }
}

impl fmt::Display for DrugTargetAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// `HIGH` needs overall >= 80 and at least half the residues very-high;
/// `MEDIUM` needs overall >= 60.
pub fn assess_drug_target(metadata: &PredictionMetadata) -> DrugTargetAssessment {
    let overall = metadata.overall_confidence();
    if overall >= 80.0 && metadata.very_high_fraction() >= 0.5 {
        DrugTargetAssessment::High
    } else if overall >= 60.0 {
        DrugTargetAssessment::Medium
    } else {
        DrugTargetAssessment::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub overall: f64,
    pub very_high_fraction: f64,
    pub very_low_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureUrls {
    pub pdb: Option<String>,
    pub cif: Option<String>,
}

/// Output of the `Fetch` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinSummary {
    pub uniprot_id: WorkUnit,
    pub description: String,
    pub organism: String,
    pub gene: String,
    /// Sequence length in residues.
    pub length: u32,
    pub confidence: ConfidenceSummary,
    pub structure_urls: StructureUrls,
    pub drug_target_assessment: String,
    /// Raw metadata, kept for later stages.
    pub metadata: PredictionMetadata,
}

impl ProteinSummary {
    pub fn from_metadata(unit: &WorkUnit, metadata: PredictionMetadata) -> Self {
        let unknown = || "Unknown".to_string();
        Self {
            uniprot_id: unit.clone(),
            description: metadata.uniprot_description.clone().unwrap_or_else(unknown),
            organism: metadata
                .organism_scientific_name
                .clone()
                .unwrap_or_else(unknown),
            gene: metadata.gene.clone().unwrap_or_else(unknown),
            length: metadata.sequence_end.unwrap_or(0),
            confidence: ConfidenceSummary {
                overall: metadata.overall_confidence(),
                very_high_fraction: metadata.very_high_fraction(),
                very_low_fraction: metadata.very_low_fraction(),
            },
            structure_urls: StructureUrls {
                pdb: metadata.pdb_url.clone(),
                cif: metadata.cif_url.clone(),
            },
            drug_target_assessment: assess_drug_target(&metadata).to_string(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(overall: f64, very_high: f64) -> PredictionMetadata {
        PredictionMetadata {
            global_metric_value: Some(overall),
            fraction_plddt_very_high: Some(very_high),
            ..Default::default()
        }
    }

    #[test]
    fn test_assessment_thresholds() {
        assert_eq!(assess_drug_target(&metadata(85.0, 0.6)), DrugTargetAssessment::High);
        assert_eq!(assess_drug_target(&metadata(85.0, 0.3)), DrugTargetAssessment::Medium);
        assert_eq!(assess_drug_target(&metadata(60.0, 0.0)), DrugTargetAssessment::Medium);
        assert_eq!(assess_drug_target(&metadata(59.9, 0.9)), DrugTargetAssessment::Low);
        assert_eq!(assess_drug_target(&PredictionMetadata::default()), DrugTargetAssessment::Low);
    }

    #[test]
    fn test_metadata_from_alphafold_json() {
        let value = json!({
            "entryId": "AF-Q8I3H7-F1",
            "uniprotDescription": "Apical membrane antigen 1",
            "organismScientificName": "Plasmodium falciparum",
            "gene": "AMA1",
            "sequenceEnd": 622,
            "globalMetricValue": 71.5,
            "fractionPlddtVeryHigh": 0.42,
            "plddtDocUrl": "https://alphafold.ebi.ac.uk/files/AF-Q8I3H7-F1-confidence_v4.json",
            "somethingNew": true
        });
        let metadata: PredictionMetadata = serde_json::from_value(value).unwrap();
        let summary = ProteinSummary::from_metadata(&WorkUnit::new("Q8I3H7"), metadata);
        assert_eq!(summary.gene, "AMA1");
        assert_eq!(summary.length, 622);
        assert!(summary.drug_target_assessment.starts_with("MEDIUM"));
        assert!(summary.metadata.plddt_doc_url.is_some());
    }

    #[test]
    fn test_missing_fields_default_to_unknown() {
        let summary =
            ProteinSummary::from_metadata(&WorkUnit::new("P04637"), PredictionMetadata::default());
        assert_eq!(summary.description, "Unknown");
        assert_eq!(summary.confidence.overall, 0.0);
    }
}
