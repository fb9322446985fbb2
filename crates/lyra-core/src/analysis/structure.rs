//! Per-residue confidence (pLDDT) analysis.
//!
//! Residues are banded by score:
//! - very high: > 90
//! - confident: > 70
//! - low: > 50
//! - very low: <= 50 (likely disordered)
//!
//! Positions are 1-indexed, following sequence numbering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::target::PredictionMetadata;
use crate::unit::WorkUnit;

/// Minimum run of very-high residues that counts as a target region.
const VERY_HIGH_MIN_RUN: u32 = 20;

/// Minimum run of confident residues that counts as a target region.
const CONFIDENT_MIN_RUN: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    VeryHigh,
    Confident,
    Low,
    VeryLow,
}

impl ConfidenceBand {
    pub fn from_score(score: f64) -> Self {
        if score > 90.0 {
            Self::VeryHigh
        } else if score > 70.0 {
            Self::Confident
        } else if score > 50.0 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

/// Inclusive residue range, serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueRange(pub u32, pub u32);

impl ResidueRange {
    pub fn length(&self) -> u32 {
        self.1 - self.0 + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BandSummary {
    pub count: u32,
    pub ranges: Vec<ResidueRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfidenceRegions {
    pub very_high: BandSummary,
    pub confident: BandSummary,
    pub low: BandSummary,
    pub very_low: BandSummary,
}

impl ConfidenceRegions {
    fn band_mut(&mut self, band: ConfidenceBand) -> &mut BandSummary {
        match band {
            ConfidenceBand::VeryHigh => &mut self.very_high,
            ConfidenceBand::Confident => &mut self.confident,
            ConfidenceBand::Low => &mut self.low,
            ConfidenceBand::VeryLow => &mut self.very_low,
        }
    }

    pub fn total(&self) -> u32 {
        self.very_high.count + self.confident.count + self.low.count + self.very_low.count
    }

    /// One-line reading of the distribution.
    pub fn interpret(&self) -> String {
        let total = self.total();
        let pct = |count: u32| {
            if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            }
        };
        format!(
            "{:.0}% very high confidence residues, {:.0}% likely disordered.",
            pct(self.very_high.count),
            pct(self.very_low.count)
        )
    }
}

/// A contiguous high-confidence stretch suitable for drug targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRegion {
    pub start: u32,
    pub end: u32,
    pub length: u32,
    pub confidence: ConfidenceBand,
    pub suitability: String,
}

/// Band every residue and compress each band into contiguous ranges.
pub fn identify_regions(scores: &[f64]) -> ConfidenceRegions {
    let mut regions = ConfidenceRegions::default();
    for (i, score) in scores.iter().enumerate() {
        let position = i as u32 + 1;
        let band = regions.band_mut(ConfidenceBand::from_score(*score));
        band.count += 1;
        match band.ranges.last_mut() {
            Some(range) if range.1 + 1 == position => range.1 = position,
            _ => band.ranges.push(ResidueRange(position, position)),
        }
    }
    regions
}

/// Long very-high runs are "excellent", long confident runs are "good".
/// Longest first; ties keep band order.
pub fn find_target_regions(regions: &ConfidenceRegions) -> Vec<TargetRegion> {
    let candidates = [
        (ConfidenceBand::VeryHigh, &regions.very_high, VERY_HIGH_MIN_RUN, "excellent"),
        (ConfidenceBand::Confident, &regions.confident, CONFIDENT_MIN_RUN, "good"),
    ];

    let mut targets: Vec<TargetRegion> = candidates
        .iter()
        .flat_map(|(band, summary, min_run, suitability)| {
            summary
                .ranges
                .iter()
                .filter(move |r| r.length() >= *min_run)
                .map(move |r| TargetRegion {
                    start: r.0,
                    end: r.1,
                    length: r.length(),
                    confidence: *band,
                    suitability: suitability.to_string(),
                })
        })
        .collect();

    targets.sort_by(|a, b| b.length.cmp(&a.length));
    targets
}

/// Metadata fractions used when per-residue scores are unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionSummary {
    pub very_high: Option<f64>,
    pub confident: Option<f64>,
    pub low: Option<f64>,
    pub very_low: Option<f64>,
}

impl FractionSummary {
    pub fn from_metadata(metadata: &PredictionMetadata) -> Self {
        Self {
            very_high: metadata.fraction_plddt_very_high,
            confident: metadata.fraction_plddt_confident,
            low: metadata.fraction_plddt_low,
            very_low: metadata.fraction_plddt_very_low,
        }
    }

    pub fn interpret(&self) -> String {
        let very_high = self.very_high.unwrap_or(0.0);
        let very_low = self.very_low.unwrap_or(0.0);
        let quality = if very_high > 0.6 {
            "excellent"
        } else if very_high > 0.4 {
            "good"
        } else if very_high > 0.2 {
            "moderate"
        } else {
            "poor"
        };
        format!(
            "Structure quality: {}. {:.0}% very high confidence, {:.0}% disordered regions.",
            quality,
            very_high * 100.0,
            very_low * 100.0
        )
    }
}

/// Output of the `AnalyzeStructure` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis_type", rename_all = "snake_case")]
pub enum StructureAnalysis {
    PerResidue {
        uniprot_id: WorkUnit,
        total_residues: u32,
        overall_confidence: Option<f64>,
        regions: ConfidenceRegions,
        drug_target_regions: Vec<TargetRegion>,
        interpretation: String,
    },
    SummaryOnly {
        uniprot_id: WorkUnit,
        overall_confidence: Option<f64>,
        fractions: FractionSummary,
        interpretation: String,
    },
}

impl StructureAnalysis {
    pub fn per_residue(unit: &WorkUnit, metadata: &PredictionMetadata, scores: &[f64]) -> Self {
        let regions = identify_regions(scores);
        Self::PerResidue {
            uniprot_id: unit.clone(),
            total_residues: scores.len() as u32,
            overall_confidence: metadata.global_metric_value,
            drug_target_regions: find_target_regions(&regions),
            interpretation: regions.interpret(),
            regions,
        }
    }

    pub fn summary_only(unit: &WorkUnit, metadata: &PredictionMetadata) -> Self {
        let fractions = FractionSummary::from_metadata(metadata);
        Self::SummaryOnly {
            uniprot_id: unit.clone(),
            overall_confidence: metadata.global_metric_value,
            interpretation: fractions.interpret(),
            fractions,
        }
    }

    pub fn overall_confidence(&self) -> Option<f64> {
        match self {
            Self::PerResidue {
                overall_confidence, ..
            }
            | Self::SummaryOnly {
                overall_confidence, ..
            } => *overall_confidence,
        }
    }

    pub fn target_regions(&self) -> &[TargetRegion] {
        match self {
            Self::PerResidue {
                drug_target_regions,
                ..
            } => drug_target_regions,
            Self::SummaryOnly { .. } => &[],
        }
    }
}

/// Pull the score list out of a confidence document.
///
/// Accepts a bare array of scores, an object with `confidenceScore`, or a
/// one-element array wrapping such an object.
pub fn extract_scores(document: &Value) -> Option<Vec<f64>> {
    let scores = match document {
        Value::Array(items) => match items.first() {
            Some(Value::Object(_)) => items[0].get("confidenceScore")?,
            _ => document,
        },
        Value::Object(_) => document.get("confidenceScore")?,
        _ => return None,
    };
    scores
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()
        .filter(|s| !s.is_empty())
}
