//! Aggregator: collapses task outcomes into a run report.
//!
//! The aggregator applies fixed rules:
//! 1. The first failed task of a unit is its root cause and never changes
//! 2. Later failures of that unit are appended to `additional_failures`
//! 3. A unit with no failure is reported by its last `success`/`partial` output
//! 4. A unit with neither is omitted from every bucket
//!
//! Aggregation is a pure function of its inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::failure::{ErrorSource, FailureKind};
use crate::stage::Stage;
use crate::task::{TaskResult, TaskStatus};
use crate::unit::WorkUnit;

/// A failure observed after the root cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalFailure {
    pub stage: Stage,
    pub task_id: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_source: Option<ErrorSource>,
}

/// Root-cause-preserving failure report for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub unit: WorkUnit,

    /// Stage of the first failed task.
    pub failed_at_stage: Stage,

    /// Error of the first failed task.
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_source: Option<ErrorSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    pub task_id: String,

    #[serde(default)]
    pub additional_failures: Vec<AdditionalFailure>,

    /// Stages skipped for this unit, in task order.
    #[serde(default)]
    pub tasks_skipped: Vec<Stage>,

    /// Last output produced after the root cause (e.g. a forced synthesis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_effort: Option<Value>,
}

/// The terminal output of a unit that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit: WorkUnit,
    /// Last stage that produced output.
    pub stage: Stage,
    pub result: Value,
}

/// Bucket sizes. `successful + partial + failed <= total_requested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SummaryCounts {
    pub total_requested: usize,
    pub successful: usize,
    pub partial: usize,
    pub failed: usize,
}

impl SummaryCounts {
    /// Requested units that landed in no bucket.
    pub fn omitted(&self) -> usize {
        self.total_requested
            .saturating_sub(self.successful + self.partial + self.failed)
    }
}

/// Final aggregate of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunReport {
    pub completed: Vec<UnitOutcome>,
    pub partial: Vec<UnitOutcome>,
    pub failed_reports: Vec<FailureReport>,
    pub summary_counts: SummaryCounts,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.summary_counts.total_requested == 0
    }

    /// Whether every requested unit completed cleanly.
    pub fn all_succeeded(&self) -> bool {
        self.summary_counts.successful == self.summary_counts.total_requested
    }
}

/// The Aggregator turns task results into a [`RunReport`].
#[derive(Debug, Clone, Copy)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate task results over the requested units.
    ///
    /// Buckets list units in request order. Duplicate requested units count
    /// once; results for units that were not requested are ignored.
    pub fn aggregate(&self, results: &[TaskResult], requested: &[WorkUnit]) -> RunReport {
        let mut report = RunReport::default();
        let mut seen: Vec<&WorkUnit> = Vec::with_capacity(requested.len());

        for unit in requested {
            if seen.contains(&unit) {
                continue;
            }
            seen.push(unit);

            let unit_results: Vec<&TaskResult> =
                results.iter().filter(|r| r.unit() == unit).collect();

            if let Some(failure) = self.build_failure_report(unit, &unit_results) {
                report.failed_reports.push(failure);
                continue;
            }

            let Some(last) = unit_results.iter().rev().find(|r| r.has_output()) else {
                continue;
            };
            let outcome = UnitOutcome {
                unit: unit.clone(),
                stage: last.stage(),
                result: last.result.clone().unwrap_or(Value::Null),
            };
            match last.status {
                TaskStatus::Success => report.completed.push(outcome),
                _ => report.partial.push(outcome),
            }
        }

        report.summary_counts = SummaryCounts {
            total_requested: seen.len(),
            successful: report.completed.len(),
            partial: report.partial.len(),
            failed: report.failed_reports.len(),
        };
        report
    }

    /// Build the report for a unit with at least one failed task.
    fn build_failure_report(&self, unit: &WorkUnit, results: &[&TaskResult]) -> Option<FailureReport> {
        let root_index = results.iter().position(|r| r.status == TaskStatus::Failed)?;
        let root = results[root_index];

        let mut report = FailureReport {
            unit: unit.clone(),
            failed_at_stage: root.stage(),
            error: root.error.clone().unwrap_or_default(),
            error_source: root.error_source,
            error_kind: root.error_kind,
            task_id: root.task.id(),
            additional_failures: Vec::new(),
            tasks_skipped: Vec::new(),
            best_effort: None,
        };

        for result in results {
            if result.status == TaskStatus::Skipped {
                report.tasks_skipped.push(result.stage());
            }
        }

        for result in &results[root_index + 1..] {
            match result.status {
                TaskStatus::Failed => report.additional_failures.push(AdditionalFailure {
                    stage: result.stage(),
                    task_id: result.task.id(),
                    error: result.error.clone().unwrap_or_default(),
                    error_source: result.error_source,
                }),
                TaskStatus::Success | TaskStatus::Partial => {
                    report.best_effort = result.result.clone();
                }
                TaskStatus::Skipped => {}
            }
        }

        Some(report)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
