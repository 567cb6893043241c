//! Error types shared by every stage of launch script generation.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type LaunchResult<T> = Result<T, LaunchError>;

#[derive(Debug, Error)]
pub enum LaunchError {
    /// Board or scenario text is not well-formed XML.
    #[error("failed to parse {document}: {message}")]
    Parse { document: String, message: String },

    /// Scenario layout problem that makes the whole run meaningless.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output directory could not be prepared.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every fungible virtual slot of the VM is already handed out.
    #[error("no free virtual PCI slot left for VM '{vm}'")]
    SlotsExhausted { vm: String },

    /// A scenario entry lacks child text without which no parameter can be built.
    #[error("VM '{vm}': required value '{path}' is missing")]
    MissingValue { vm: String, path: String },

    /// A scenario or board value is present but cannot be interpreted.
    #[error("VM '{vm}': value '{value}' at '{path}' is invalid")]
    InvalidValue {
        vm: String,
        path: String,
        value: String,
    },
}

impl LaunchError {
    pub(crate) fn missing(vm: &str, path: &str) -> Self {
        LaunchError::MissingValue {
            vm: vm.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn invalid(vm: &str, path: &str, value: &str) -> Self {
        LaunchError::InvalidValue {
            vm: vm.to_string(),
            path: path.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn output_is_file(path: PathBuf) -> Self {
        LaunchError::Storage(format!(
            "Cannot create output directory {}: File exists",
            path.display()
        ))
    }
}
