//! Deterministic analysis helpers used by the stages.
//!
//! Nothing in here performs I/O. The runtime fetches documents and hands
//! them to these functions; reply parsing is tolerant of the usual ways a
//! text-generation model mangles JSON.

pub mod annotations;
pub mod reply;
pub mod structure;
pub mod target;

pub use annotations::UniProtAnnotations;
pub use reply::{parse_json_reply, parse_or_raw};
pub use structure::{
    extract_scores, find_target_regions, identify_regions, ConfidenceBand, ConfidenceRegions,
    FractionSummary, ResidueRange, StructureAnalysis, TargetRegion,
};
pub use target::{assess_drug_target, DrugTargetAssessment, PredictionMetadata, ProteinSummary};
