#[derive(Debug, Clone)]
pub struct TaskMetrics {
    pub name: &'static str,
    pub duration_us: u128,
}

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_duration_us: u128,
    pub tasks: Vec<TaskMetrics>,
}

impl PipelineMetrics {
    pub fn task_duration_us(&self, name: &str) -> Option<u128> {
        self.tasks
            .iter()
            .find(|task| task.name == name)
            .map(|task| task.duration_us)
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name).collect()
    }
}
