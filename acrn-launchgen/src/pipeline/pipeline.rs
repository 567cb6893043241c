//! Sequential pipeline executor.

use super::metrics::{PipelineMetrics, TaskMetrics};
use super::task::BoxedTask;
use crate::errors::LaunchResult;
use std::time::Instant;

pub struct ExecutionPlan<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn tasks(self) -> Vec<BoxedTask<Ctx>> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Runs an execution plan.
///
/// Tasks run strictly in plan order. The first failing task stops the
/// pipeline and its error is returned unchanged.
pub struct PipelineExecutor;

impl PipelineExecutor {
    pub fn execute<Ctx>(plan: ExecutionPlan<Ctx>, ctx: &mut Ctx) -> LaunchResult<PipelineMetrics> {
        let total_start = Instant::now();
        let mut task_metrics = Vec::new();

        for task in plan.tasks() {
            let name = task.name();
            tracing::debug!(task = name, "Running pipeline task");
            let task_start = Instant::now();
            task.run(ctx).inspect_err(|e| {
                tracing::debug!(task = name, error = %e, "Pipeline task failed");
            })?;
            let duration_us = task_start.elapsed().as_micros();
            tracing::trace!(task = name, duration_us, "Pipeline task finished");
            task_metrics.push(TaskMetrics { name, duration_us });
        }

        Ok(PipelineMetrics {
            total_duration_us: total_start.elapsed().as_micros(),
            tasks: task_metrics,
        })
    }
}
