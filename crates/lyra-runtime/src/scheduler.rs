//! Task scheduler: runs a static task list under the skip cascade.
//!
//! Each unit's tasks run strictly in order against that unit's own
//! [`UnitTracker`], so a stage never starts before the previous stage of the
//! same unit has been classified. Different units may run concurrently
//! (`max_concurrent_units`); results are returned in generated-task order
//! either way.
//!
//! Every failure, whether in-band, raised, a panic or a missed deadline,
//! becomes a `failed` [`TaskResult`]. Nothing a stage does can abort the run.

use futures::{stream, FutureExt, StreamExt};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lyra_core::{
    FailureKind, Gate, StageFailure, StageResult, Task, TaskResult, TaskStatus, UnitTracker,
    WorkUnit,
};

use crate::adjust::{NoAdjustment, PlanAdjuster, TaskEvent};
use crate::config::ExecutionConfig;
use crate::resilience::Deadline;
use crate::stages::{StageContext, StageRegistry};

/// Upper bound on tasks a plan adjuster may insert for one unit.
pub const MAX_INSERTED_PER_UNIT: u32 = 8;

/// Executes tasks against a [`StageRegistry`].
pub struct Scheduler {
    registry: StageRegistry,
    adjuster: Arc<dyn PlanAdjuster>,
    execution: ExecutionConfig,
}

impl Scheduler {
    pub fn new(registry: StageRegistry, execution: ExecutionConfig) -> Self {
        Self {
            registry,
            adjuster: Arc::new(NoAdjustment),
            execution,
        }
    }

    /// Install the hook consulted after every executed task.
    pub fn with_adjuster(mut self, adjuster: Arc<dyn PlanAdjuster>) -> Self {
        self.adjuster = adjuster;
        self
    }

    /// Run every task and return exactly one result per task.
    ///
    /// Tasks inserted by the adjuster follow the task that triggered them.
    pub async fn execute(&self, tasks: Vec<Task>, focus_areas: &[String]) -> Vec<TaskResult> {
        let run_deadline = Deadline::after(self.execution.run_deadline);
        let first_free_ordinal = tasks.iter().map(|t| t.ordinal + 1).max().unwrap_or(0);
        let groups = group_by_unit(tasks);
        info!(
            units = groups.len(),
            max_concurrent_units = self.execution.max_concurrent_units,
            "Executing tasks"
        );

        let per_unit: Vec<Vec<TaskResult>> = stream::iter(groups.into_iter().enumerate())
            .map(move |(index, (unit, tasks))| {
                // Each unit owns a disjoint ordinal range for inserted tasks.
                let base = first_free_ordinal + index as u32 * MAX_INSERTED_PER_UNIT;
                self.run_unit(unit, tasks, focus_areas, run_deadline, base)
            })
            .buffered(self.execution.max_concurrent_units.max(1))
            .collect()
            .await;

        per_unit.into_iter().flatten().collect()
    }

    async fn run_unit(
        &self,
        unit: WorkUnit,
        tasks: Vec<Task>,
        focus_areas: &[String],
        run_deadline: Deadline,
        insert_base: u32,
    ) -> Vec<TaskResult> {
        let deadline = Deadline::after(self.execution.unit_deadline).min(run_deadline);
        let mut tracker = UnitTracker::new();
        let mut ctx = StageContext::new(unit.clone(), focus_areas.to_vec());
        let mut queue: VecDeque<Task> = tasks.into();
        let mut results = Vec::with_capacity(queue.len());
        let mut inserted = 0u32;

        while let Some(task) = queue.pop_front() {
            if let Gate::Skip { reason } = tracker.gate(&task) {
                debug!(task = %task, reason = %reason, "Task skipped");
                results.push(tracker.skip(task, reason));
                continue;
            }

            let started = Instant::now();
            let outcome = self.run_task(&task, &ctx, deadline).await;
            let result = tracker.record(task, outcome, started.elapsed());
            log_result(&result);

            if let Some(output) = &result.result {
                ctx.insert(result.stage(), output.clone());
            }

            let event = TaskEvent {
                result: &result,
                state: tracker.state(&unit),
            };
            let room = MAX_INSERTED_PER_UNIT - inserted;
            let requested = self.adjuster.on_task(&event);
            if requested.len() as u32 > room {
                warn!(unit = %unit, requested = requested.len(), room, "Plan adjustment capped");
            }
            let extra: Vec<Task> = requested
                .into_iter()
                .take(room as usize)
                .map(|stage| {
                    let task = Task::new(unit.clone(), stage, insert_base + inserted);
                    inserted += 1;
                    task
                })
                .collect();
            for task in extra.into_iter().rev() {
                info!(task = %task, "Task inserted by plan adjuster");
                queue.push_front(task);
            }

            results.push(result);
        }
        results
    }

    async fn run_task(&self, task: &Task, ctx: &StageContext, deadline: Deadline) -> StageResult {
        if deadline.is_expired() {
            return Err(StageFailure::exception(
                FailureKind::DeadlineExceeded,
                format!("Deadline passed before {} started", task.stage),
            ));
        }
        let Some(agent) = self.registry.get(task.stage) else {
            return Err(StageFailure::exception(
                FailureKind::Internal,
                format!("No agent registered for stage {}", task.stage),
            ));
        };

        let guarded = AssertUnwindSafe(agent.run(ctx)).catch_unwind();
        match deadline.run(guarded).await {
            Some(Ok(outcome)) => outcome,
            Some(Err(panic)) => Err(StageFailure::exception(
                FailureKind::Panic,
                panic_message(panic.as_ref()),
            )),
            None => Err(StageFailure::exception(
                FailureKind::DeadlineExceeded,
                format!("{} exceeded the deadline and was cancelled", task.stage),
            )),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("execution", &self.execution)
            .finish()
    }
}

/// Split tasks per unit, keeping first-appearance order of units and
/// generation order within a unit.
fn group_by_unit(tasks: Vec<Task>) -> Vec<(WorkUnit, Vec<Task>)> {
    let mut groups: Vec<(WorkUnit, Vec<Task>)> = Vec::new();
    for task in tasks {
        match groups.iter_mut().find(|(unit, _)| *unit == task.unit) {
            Some((_, group)) => group.push(task),
            None => groups.push((task.unit.clone(), vec![task])),
        }
    }
    groups
}

fn log_result(result: &TaskResult) {
    match result.status {
        TaskStatus::Failed => warn!(
            task = %result.task,
            error_source = ?result.error_source,
            error = result.error.as_deref().unwrap_or(""),
            duration = ?result.duration,
            "Task failed"
        ),
        status => info!(task = %result.task, status = ?status, duration = ?result.duration, "Task finished"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("stage panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("stage panicked: {}", s)
    } else {
        "stage panicked".to_string()
    }
}
