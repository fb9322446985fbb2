//! Per-unit state machine behind the skip cascade.
//!
//! Every unit starts `active`. A failed `Fetch` moves it to `failed`, which
//! suppresses all of its remaining tasks. A failure in any later stage moves
//! an active unit to `degraded`, which suppresses everything except the
//! terminal `Synthesize` stage. Neither state is ever left again.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::failure::{check_payload, StageResult};
use crate::stage::Stage;
use crate::task::{Task, TaskResult};
use crate::unit::WorkUnit;

/// State of one unit during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Active,
    /// A stage after `Fetch` failed; only `Synthesize` still runs.
    Degraded { at: Stage },
    /// `Fetch` failed; nothing else runs.
    Failed { at: Stage },
}

impl UnitState {
    pub fn is_active(&self) -> bool {
        matches!(self, UnitState::Active)
    }
}

/// Decision for a task about to be considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Run,
    Skip { reason: String },
}

/// Tracks unit states and classifies task outcomes.
///
/// One tracker belongs to one run. Units never seen before are `active`.
#[derive(Debug, Default)]
pub struct UnitTracker {
    states: HashMap<WorkUnit, UnitState>,
}

impl UnitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a unit.
    pub fn state(&self, unit: &WorkUnit) -> UnitState {
        self.states
            .get(unit)
            .copied()
            .unwrap_or(UnitState::Active)
    }

    /// Decide whether a task runs or is skipped.
    pub fn gate(&self, task: &Task) -> Gate {
        match self.state(&task.unit) {
            UnitState::Active => Gate::Run,
            UnitState::Failed { at } => Gate::Skip {
                reason: format!("Skipped: {} failed at {}", task.unit, at),
            },
            UnitState::Degraded { .. } if task.stage.is_terminal() => Gate::Run,
            UnitState::Degraded { at } => Gate::Skip {
                reason: format!("Skipped: {} degraded after {} failed", task.unit, at),
            },
        }
    }

    /// Classify an executed task and apply the unit-state transition.
    ///
    /// A payload with an in-band `error` key counts as a failure exactly
    /// like a raised one.
    pub fn record(&mut self, task: Task, outcome: StageResult, duration: Duration) -> TaskResult {
        match outcome.and_then(check_payload) {
            Ok(payload) => match self.state(&task.unit) {
                UnitState::Active => TaskResult::success(task, payload, duration),
                _ => TaskResult::partial(task, payload, duration),
            },
            Err(failure) => {
                self.mark_failed(&task);
                TaskResult::failed(task, &failure, duration)
            }
        }
    }

    /// Record a skipped task. The unit's state is unchanged.
    pub fn skip(&self, task: Task, reason: impl Into<String>) -> TaskResult {
        TaskResult::skipped(task, reason)
    }

    fn mark_failed(&mut self, task: &Task) {
        let current = self.state(&task.unit);
        let next = match current {
            UnitState::Failed { .. } => current,
            _ if task.stage.is_entry() => UnitState::Failed { at: task.stage },
            UnitState::Active => UnitState::Degraded { at: task.stage },
            UnitState::Degraded { .. } => current,
        };
        self.states.insert(task.unit.clone(), next);
    }
}
