//! Tasks and their outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::failure::{ErrorSource, FailureKind, StageFailure};
use crate::stage::Stage;
use crate::unit::WorkUnit;

/// A (unit, stage) pair scheduled for execution.
///
/// The ordinal is the task's position in generation order and makes the id
/// unique within a run, including tasks inserted by a plan adjuster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub unit: WorkUnit,
    pub stage: Stage,
    pub ordinal: u32,
}

impl Task {
    pub fn new(unit: WorkUnit, stage: Stage, ordinal: u32) -> Self {
        Self {
            unit,
            stage,
            ordinal,
        }
    }

    /// Run-unique identifier, e.g. `Q8I3H7:fetch#0`.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.unit, self.stage, self.ordinal)
    }
}

/// Outcome classification of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Partial,
    Failed,
    Skipped,
}

/// Outcome of one task. Exactly one exists per generated task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "task_id")]
    pub task: Task,

    pub status: TaskStatus,

    /// Stage output, present only on `success` / `partial`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Human-readable cause, present on `failed` / `skipped`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_source: Option<ErrorSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    /// Elapsed time for the attempt; zero for skipped tasks.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl TaskResult {
    pub fn success(task: Task, result: Value, duration: Duration) -> Self {
        Self::completed(task, TaskStatus::Success, result, duration)
    }

    pub fn partial(task: Task, result: Value, duration: Duration) -> Self {
        Self::completed(task, TaskStatus::Partial, result, duration)
    }

    pub fn failed(task: Task, failure: &StageFailure, duration: Duration) -> Self {
        Self {
            task,
            status: TaskStatus::Failed,
            result: None,
            error: Some(failure.describe()),
            error_source: Some(failure.origin),
            error_kind: Some(failure.kind),
            duration,
        }
    }

    pub fn skipped(task: Task, reason: impl Into<String>) -> Self {
        Self {
            task,
            status: TaskStatus::Skipped,
            result: None,
            error: Some(reason.into()),
            error_source: None,
            error_kind: None,
            duration: Duration::ZERO,
        }
    }

    fn completed(task: Task, status: TaskStatus, result: Value, duration: Duration) -> Self {
        Self {
            task,
            status,
            result: Some(result),
            error: None,
            error_source: None,
            error_kind: None,
            duration,
        }
    }

    pub fn unit(&self) -> &WorkUnit {
        &self.task.unit
    }

    pub fn stage(&self) -> Stage {
        self.task.stage
    }

    /// Whether the task produced a usable payload.
    pub fn has_output(&self) -> bool {
        matches!(self.status, TaskStatus::Success | TaskStatus::Partial)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
