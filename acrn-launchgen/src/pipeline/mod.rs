//! Table-driven step execution.
//!
//! A pipeline runs an ordered list of tasks against one mutable context and
//! records how long each task took. The launch script generator uses it to
//! run the device enumeration steps of a VM in their fixed order.
//!
//! ```text
//! ExecutionPlan → [Task, Task, ...] → PipelineMetrics
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let plan = ExecutionPlan::new(vec![Box::new(StepA), Box::new(StepB)]);
//! let metrics = PipelineExecutor::execute(plan, &mut ctx)?;
//! println!("pipeline took {}us", metrics.total_duration_us);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod task;

pub use metrics::{PipelineMetrics, TaskMetrics};
pub use pipeline::{ExecutionPlan, PipelineExecutor};
pub use task::{BoxedTask, PipelineTask};
