//! Generator configuration and run report.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::launch::ScriptSummary;

pub const DEFAULT_OUT_DIR: &str = "output";

/// Inputs of one generator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    pub board: PathBuf,
    pub scenario: PathBuf,
    /// Post-launch-relative id of the only VM to generate, or 0 for all of them.
    pub user_vm_id: u32,
    pub out_dir: PathBuf,
    /// Replacement for the built-in launch script template.
    pub template: Option<PathBuf>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            board: PathBuf::new(),
            scenario: PathBuf::new(),
            user_vm_id: 0,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            template: None,
        }
    }
}

impl GeneratorOptions {
    pub fn new(board: impl Into<PathBuf>, scenario: impl Into<PathBuf>) -> Self {
        Self {
            board: board.into(),
            scenario: scenario.into(),
            ..Self::default()
        }
    }

    pub fn with_user_vm_id(mut self, user_vm_id: u32) -> Self {
        self.user_vm_id = user_vm_id;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// What a run wrote.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub service_vm_id: Option<u32>,
    pub scripts: Vec<ScriptSummary>,
}
