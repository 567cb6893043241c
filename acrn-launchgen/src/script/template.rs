//! Launch script boilerplate.

use std::path::Path;

use crate::errors::LaunchResult;

/// Byte offset at which the VM name header is spliced into the template.
pub const HEADER_LEN: usize = 99;

const BUILTIN: &str = include_str!("../../templates/launch_script_template.sh");

/// Shell boilerplate (helper functions) every launch script starts with.
#[derive(Debug, Clone)]
pub struct ScriptTemplate {
    text: String,
}

impl Default for ScriptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScriptTemplate {
    /// Template shipped with the crate.
    pub fn builtin() -> Self {
        Self::new(BUILTIN)
    }

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn load(path: &Path) -> LaunchResult<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "Loaded launch script template");
        Ok(Self::new(text))
    }

    /// Template text before and after the header offset.
    ///
    /// Short templates are not split; an offset inside a multi-byte
    /// character moves forward to the next character boundary.
    pub fn split(&self) -> (&str, &str) {
        let mut at = HEADER_LEN.min(self.text.len());
        while !self.text.is_char_boundary(at) {
            at += 1;
        }
        self.text.split_at(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_header_ends_on_line_boundary() {
        let template = ScriptTemplate::builtin();
        let (head, body) = template.split();
        assert_eq!(head.len(), HEADER_LEN);
        assert!(head.starts_with("#!/bin/bash\n"));
        assert!(head.ends_with("#\n\n"));
        assert!(body.starts_with("function probe_modules()"));
    }

    #[test]
    fn test_builtin_defines_every_deferred_helper() {
        let template = ScriptTemplate::builtin();
        let (_, body) = template.split();
        for helper in [
            "probe_modules",
            "add_cpus",
            "add_virtual_device",
            "add_passthrough_device",
            "add_interrupt_storm_monitor",
            "add_logger_settings",
            "mount_partition",
            "unmount_partition",
        ] {
            assert!(body.contains(&format!("function {helper}()")), "{helper}");
        }
    }

    #[test]
    fn test_short_template_is_not_split() {
        let template = ScriptTemplate::new("#!/bin/sh\n");
        assert_eq!(template.split(), ("#!/bin/sh\n", ""));
    }

    #[test]
    fn test_split_respects_char_boundary() {
        let mut text = "#".repeat(HEADER_LEN - 1);
        text.push('é');
        text.push_str("rest");
        let template = ScriptTemplate::new(text);
        let (head, body) = template.split();
        assert!(head.ends_with('é'));
        assert_eq!(body, "rest");
    }
}
