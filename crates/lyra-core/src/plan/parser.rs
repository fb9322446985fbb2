//! Plan parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::{validate_plan_schema, SchemaViolation};
use crate::stage::PipelineDepth;
use crate::task::Task;
use crate::unit::WorkUnit;

/// Errors that can occur when parsing plans.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Failed to read plan file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Plan does not match schema: {}", describe(.0))]
    SchemaViolation(Vec<SchemaViolation>),
}

fn describe(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the run is trying to find out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[default]
    DrugTarget,
    StructureOnly,
    Comparison,
}

fn default_full_pipeline() -> bool {
    true
}

/// An analysis plan: which units to run and how deep to go.
///
/// Plans are produced by an external planner and treated as untrusted.
/// Identifier format is NOT checked here; malformed identifiers surface as
/// validation failures of the `Fetch` stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Requested identifiers, as given.
    pub uniprot_ids: Vec<String>,

    #[serde(default)]
    pub analysis_type: AnalysisType,

    /// Aspects the reasoning stages should emphasise.
    #[serde(default)]
    pub focus_areas: Vec<String>,

    /// Run all five stages (`true`) or structure analysis only.
    #[serde(default = "default_full_pipeline")]
    pub requires_full_pipeline: bool,

    /// Planner's own explanation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Plan {
    /// A plan over the given identifiers.
    pub fn new<I, S>(ids: I, full_pipeline: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uniprot_ids: ids.into_iter().map(Into::into).collect(),
            analysis_type: if full_pipeline {
                AnalysisType::DrugTarget
            } else {
                AnalysisType::StructureOnly
            },
            focus_areas: Vec::new(),
            requires_full_pipeline: full_pipeline,
            reasoning: None,
        }
    }

    /// Parse a plan from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PlanError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a plan from JSON string.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a plan from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Validate against the plan schema, then deserialize.
    pub fn from_value(value: Value) -> Result<Self, PlanError> {
        validate_plan_schema(&value).map_err(PlanError::SchemaViolation)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Stage depth implied by the plan.
    pub fn depth(&self) -> PipelineDepth {
        PipelineDepth::from_full_flag(self.requires_full_pipeline)
    }

    /// Normalised units in request order. Duplicates collapse to their
    /// first occurrence.
    pub fn units(&self) -> Vec<WorkUnit> {
        let mut units: Vec<WorkUnit> = Vec::with_capacity(self.uniprot_ids.len());
        for id in &self.uniprot_ids {
            let unit = WorkUnit::new(id);
            if !units.contains(&unit) {
                units.push(unit);
            }
        }
        units
    }

    /// Expand into the static task list: units left to right, stages in
    /// pipeline order within a unit.
    pub fn build_tasks(&self) -> Vec<Task> {
        let stages = self.depth().stages();
        self.units()
            .into_iter()
            .flat_map(|unit| stages.iter().map(move |stage| (unit.clone(), *stage)))
            .enumerate()
            .map(|(ordinal, (unit, stage))| Task::new(unit, stage, ordinal as u32))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.uniprot_ids.is_empty()
    }
}
