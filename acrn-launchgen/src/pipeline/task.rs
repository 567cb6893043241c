//! Task trait for pipeline execution.

use crate::errors::LaunchResult;

/// One step of a pipeline.
///
/// Implement this for each unit of work; tasks share a mutable context that
/// earlier tasks fill in and later tasks read.
pub trait PipelineTask<Ctx> {
    /// Execute the task against the shared context.
    fn run(&self, ctx: &mut Ctx) -> LaunchResult<()>;

    /// Human-readable task name for logging.
    fn name(&self) -> &'static str;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;
