//! Passthrough option inference.
//!
//! Some physical devices need extra `acrn-dm` options depending on how the VM
//! is configured. The knowledge lives in a rule table: each rule pairs a PCI
//! class-code prefix with a scenario predicate and the options to add when
//! both match. Rules are evaluated in table order.

use crate::document::TreeNode;

/// Condition evaluated against a VM's scenario subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioPredicate {
    /// Some element matching `path` has exactly `value` as text.
    TextEquals {
        path: &'static str,
        value: &'static str,
    },
}

impl ScenarioPredicate {
    pub fn holds<N: TreeNode>(&self, vm: &N) -> bool {
        match *self {
            ScenarioPredicate::TextEquals { path, value } => vm.has_text(path, value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PassthroughRule {
    pub class_prefix: &'static str,
    pub predicate: ScenarioPredicate,
    pub options: &'static [&'static str],
}

/// Built-in rules.
pub const DEFAULT_RULES: &[PassthroughRule] = &[
    // Ethernet controller: precision time measurement, when enabled for the VM.
    PassthroughRule {
        class_prefix: "0x0200",
        predicate: ScenarioPredicate::TextEquals {
            path: ".//PTM",
            value: "y",
        },
        options: &["enable_ptm"],
    },
    // xHCI USB controller: Windows guests need the D3hot reset quirk.
    PassthroughRule {
        class_prefix: "0x0c0330",
        predicate: ScenarioPredicate::TextEquals {
            path: ".//os_type",
            value: "Windows OS",
        },
        options: &["d3hot_reset"],
    },
];

/// Applies a rule table to passthrough devices of one VM.
#[derive(Debug, Clone)]
pub struct OptionInference {
    rules: Vec<PassthroughRule>,
}

impl Default for OptionInference {
    fn default() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }
}

impl OptionInference {
    pub fn with_rules(rules: Vec<PassthroughRule>) -> Self {
        Self { rules }
    }

    /// Options for `device` (a board PCI node) in the VM described by `vm`.
    ///
    /// Empty when the device is unknown to the board or no rule applies.
    pub fn infer<D: TreeNode, V: TreeNode>(&self, device: Option<&D>, vm: &V) -> Vec<String> {
        let Some(class_code) = device.and_then(|node| node.child_text("class")) else {
            return Vec::new();
        };

        let mut options = Vec::new();
        for rule in &self.rules {
            if class_code.starts_with(rule.class_prefix) && rule.predicate.holds(vm) {
                tracing::debug!(
                    class = %class_code,
                    prefix = rule.class_prefix,
                    options = ?rule.options,
                    "Passthrough rule matched"
                );
                options.extend(rule.options.iter().map(|opt| opt.to_string()));
            }
        }
        options
    }
}
