//! Device model parameters.

/// Column width the command name of a deferred parameter is padded to.
const COMMAND_WIDTH: usize = 40;

/// One entry of the `dm_params` array in a launch script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmParameter {
    /// Written verbatim, e.g. `-m 2048M`.
    Literal(String),
    /// A template function evaluated by the shell when the script runs,
    /// written as `` `add_virtual_device 3 virtio-net ...` ``.
    Deferred { command: String, args: String },
}

impl DmParameter {
    pub fn literal(text: impl Into<String>) -> Self {
        DmParameter::Literal(text.into())
    }

    pub fn deferred(command: impl Into<String>, args: impl AsRef<str>) -> Self {
        DmParameter::Deferred {
            command: command.into(),
            args: args.as_ref().trim().to_string(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, DmParameter::Deferred { .. })
    }

    /// Template function name of a deferred parameter.
    pub fn command(&self) -> Option<&str> {
        match self {
            DmParameter::Literal(_) => None,
            DmParameter::Deferred { command, .. } => Some(command),
        }
    }

    pub fn render(&self) -> String {
        match self {
            DmParameter::Literal(text) => text.clone(),
            DmParameter::Deferred { command, args } => {
                let line = format!("{:<width$} {}", command, args, width = COMMAND_WIDTH);
                format!("`{}`", line.trim())
            }
        }
    }
}

impl std::fmt::Display for DmParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_renders_verbatim() {
        assert_eq!(DmParameter::literal("-m 2048M").render(), "-m 2048M");
    }

    #[test]
    fn test_deferred_pads_command() {
        let param = DmParameter::deferred("add_cpus", "2 4");
        let rendered = param.render();
        assert!(rendered.starts_with("`add_cpus "));
        assert!(rendered.ends_with(" 2 4`"));
        assert_eq!(rendered.len(), 1 + 40 + 1 + 3 + 1);
    }

    #[test]
    fn test_deferred_without_args_is_trimmed() {
        let param = DmParameter::deferred("add_virtual_device", "3 virtio-gpu ");
        assert_eq!(
            param.render(),
            format!("`{:<40} 3 virtio-gpu`", "add_virtual_device")
        );
    }
}
