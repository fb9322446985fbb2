//! The fixed stage sequence every unit runs through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a unit's pipeline.
///
/// Stages for a unit always execute in declaration order. The derived
/// `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetch prediction metadata and build the unit summary.
    Fetch,
    /// Per-residue structure confidence analysis.
    AnalyzeStructure,
    /// LLM reasoning with self-reflection.
    Reason,
    /// LLM critique against external annotations.
    Critique,
    /// Best-effort terminal summary.
    Synthesize,
}

/// How much of the stage sequence a plan requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineDepth {
    /// `Fetch` and `AnalyzeStructure` only.
    StructureOnly,
    /// All five stages.
    Full,
}

impl PipelineDepth {
    /// Depth from the plan's "full pipeline required" flag.
    pub fn from_full_flag(full: bool) -> Self {
        if full {
            Self::Full
        } else {
            Self::StructureOnly
        }
    }

    /// Stages run at this depth, in order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::StructureOnly => &[Stage::Fetch, Stage::AnalyzeStructure],
            Self::Full => &Stage::ALL,
        }
    }
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Fetch,
        Stage::AnalyzeStructure,
        Stage::Reason,
        Stage::Critique,
        Stage::Synthesize,
    ];

    /// Stable snake_case name used in logs and task ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::AnalyzeStructure => "analyze_structure",
            Stage::Reason => "reason",
            Stage::Critique => "critique",
            Stage::Synthesize => "synthesize",
        }
    }

    /// Position in the pipeline (0-based).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// A failure here fails the whole unit.
    pub fn is_entry(&self) -> bool {
        matches!(self, Stage::Fetch)
    }

    /// The terminal stage still runs for degraded units.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Synthesize)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_matches_pipeline() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::Synthesize.index(), 4);
    }

    #[test]
    fn test_depth_prefixes() {
        assert_eq!(
            PipelineDepth::StructureOnly.stages(),
            &[Stage::Fetch, Stage::AnalyzeStructure]
        );
        assert_eq!(PipelineDepth::Full.stages().len(), 5);
        assert_eq!(PipelineDepth::from_full_flag(false), PipelineDepth::StructureOnly);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Stage::AnalyzeStructure).unwrap();
        assert_eq!(json, "\"analyze_structure\"");
        assert_eq!(Stage::AnalyzeStructure.to_string(), "analyze_structure");
    }
}
