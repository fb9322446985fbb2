//! Plan adjustment hook.
//!
//! The scheduler emits a [`TaskEvent`] after every executed task. A
//! [`PlanAdjuster`] may answer with stages to run next for that unit.
//! Inserted stages are gated by the same skip cascade as generated ones.

use lyra_core::{Stage, TaskResult, TaskStatus, UnitState};
use serde_json::Value;
use tracing::warn;

/// Emitted once per executed (not skipped) task.
#[derive(Debug, Clone, Copy)]
pub struct TaskEvent<'a> {
    pub result: &'a TaskResult,
    /// Unit state after the task was classified.
    pub state: UnitState,
}

impl TaskEvent<'_> {
    pub fn stage(&self) -> Stage {
        self.result.stage()
    }

    pub fn succeeded(&self) -> bool {
        self.result.status == TaskStatus::Success
    }

    pub fn output(&self) -> Option<&Value> {
        self.result.result.as_ref()
    }
}

/// Reacts to task events. Returns stages to insert after the current task.
pub trait PlanAdjuster: Send + Sync {
    fn on_task(&self, event: &TaskEvent<'_>) -> Vec<Stage>;
}

/// Never adjusts anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAdjustment;

impl PlanAdjuster for NoAdjustment {
    fn on_task(&self, _event: &TaskEvent<'_>) -> Vec<Stage> {
        Vec::new()
    }
}

/// Logs structures whose overall confidence is below a threshold.
///
/// Advisory only: it never changes the task list.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceWatch {
    threshold: f64,
}

impl ConfidenceWatch {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Overall confidence of a low-confidence structure result, if any.
    pub fn low_confidence(&self, event: &TaskEvent<'_>) -> Option<f64> {
        if event.stage() != Stage::AnalyzeStructure || !event.succeeded() {
            return None;
        }
        event
            .output()
            .and_then(|v| v.get("overall_confidence"))
            .and_then(Value::as_f64)
            .filter(|c| *c < self.threshold)
    }
}

impl PlanAdjuster for ConfidenceWatch {
    fn on_task(&self, event: &TaskEvent<'_>) -> Vec<Stage> {
        if let Some(confidence) = self.low_confidence(event) {
            warn!(
                unit = %event.result.unit(),
                confidence,
                threshold = self.threshold,
                "Low structure confidence, downstream conclusions may be unreliable"
            );
        }
        Vec::new()
    }
}
