//! Launch script artifact.
//!
//! A [`LaunchScript`] collects what the device enumeration pass decides for
//! one VM and renders it as a bash script:
//!
//! ```text
//! template header + "# Launch script for VM name: ..."
//! template body (helper functions)
//! VM descriptor variables
//! init commands
//! CPU id table (comment)
//! dm_params=( ... ) and the acrn-dm invocation
//! deinit commands
//! ```
//!
//! Commands and parameters are kept in insertion order and inserting the
//! same entry twice has no effect.

mod param;
mod template;

pub use param::DmParameter;
pub use template::{HEADER_LEN, ScriptTemplate};

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;

use crate::errors::LaunchResult;

const CPU_TABLE_NOTE: &str = "
# Note for developers: The number of available logical CPUs depends on the
# number of enabled cores and whether Hyperthreading is enabled in the BIOS
# settings. CPU IDs are assigned to each logical CPU but are not the same ID
# value throughout the system:
#
# Native CPU_ID:
#       ID enumerated by the Linux Kernel and shown in the
#       ACRN Configurator's CPU Affinity option (used in the scenario.xml)
# Service VM CPU_ID:
#       ID assigned by the Service VM at runtime
# APIC_ID:
#       Advanced Programmable Interrupt Controller's unique ID as
#       enumerated by the board inspector (used in this launch script)
#
# This table shows equivalent CPU IDs for this scenario and board:
#
";

#[derive(Debug, Clone)]
pub struct LaunchScript {
    vm_name: String,
    descriptors: IndexMap<String, String>,
    init_commands: Vec<String>,
    cpu_table: IndexMap<u32, u32>,
    dm_parameters: Vec<DmParameter>,
    deinit_commands: Vec<String>,
}

impl LaunchScript {
    pub fn new(vm_name: impl Into<String>) -> Self {
        Self {
            vm_name: vm_name.into(),
            descriptors: IndexMap::new(),
            init_commands: Vec::new(),
            cpu_table: IndexMap::new(),
            dm_parameters: Vec::new(),
            deinit_commands: Vec::new(),
        }
    }

    pub fn vm_name(&self) -> &str {
        &self.vm_name
    }

    /// Set a shell variable describing the VM. Later writes replace the
    /// value but keep the variable's original position.
    pub fn add_vm_descriptor(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.descriptors.insert(name.into(), value.into());
    }

    pub fn add_init_command(&mut self, command: impl Into<String>) {
        push_unique(&mut self.init_commands, command.into());
    }

    pub fn add_deinit_command(&mut self, command: impl Into<String>) {
        push_unique(&mut self.deinit_commands, command.into());
    }

    pub fn add_plain_dm_parameter(&mut self, param: impl Into<String>) {
        self.add_dm_parameter(DmParameter::literal(param));
    }

    /// Add a parameter computed by the template function `command` when the
    /// script runs.
    pub fn add_dynamic_dm_parameter(&mut self, command: &str, args: impl AsRef<str>) {
        self.add_dm_parameter(DmParameter::deferred(command, args));
    }

    pub fn add_dm_parameter(&mut self, param: DmParameter) {
        if !self.dm_parameters.contains(&param) {
            tracing::trace!(vm = %self.vm_name, param = %param, "Adding device model parameter");
            self.dm_parameters.push(param);
        }
    }

    pub fn has_dm_parameter(&self, predicate: impl Fn(&DmParameter) -> bool) -> bool {
        self.dm_parameters.iter().any(predicate)
    }

    /// Native CPU id → APIC id pairs shown in the CPU table, in display order.
    pub fn set_cpu_table(&mut self, cpus: impl IntoIterator<Item = (u32, u32)>) {
        self.cpu_table = cpus.into_iter().collect();
    }

    pub fn descriptors(&self) -> &IndexMap<String, String> {
        &self.descriptors
    }

    pub fn init_commands(&self) -> &[String] {
        &self.init_commands
    }

    pub fn deinit_commands(&self) -> &[String] {
        &self.deinit_commands
    }

    pub fn dm_parameters(&self) -> &[DmParameter] {
        &self.dm_parameters
    }

    /// Render the full script text.
    pub fn render(&self, template: &ScriptTemplate) -> String {
        let (header, body) = template.split();
        let mut s = String::new();

        s.push_str(header);
        let _ = writeln!(s, "# Launch script for VM name: {}", self.vm_name);
        s.push('\n');
        s.push_str(body);

        s.push_str("\n###\n# The followings are generated by acrn-launchgen\n###\n");
        s.push('\n');

        s.push_str("# Defining variables that describe VM types\n");
        for (name, value) in &self.descriptors {
            let _ = writeln!(s, "{name}={value}");
        }
        s.push('\n');

        s.push_str("# Initializing\n");
        for command in &self.init_commands {
            let _ = writeln!(s, "{command}");
        }
        s.push('\n');

        s.push_str(CPU_TABLE_NOTE);
        s.push('\n');
        s.push_str("#   Native CPU_ID    Service VM CPU_ID    APIC_ID\n");
        s.push_str("#   -------------    -----------------    -------\n");
        for (vcpu_id, (cpu_id, apic_id)) in self.cpu_table.iter().enumerate() {
            let _ = writeln!(s, "#   {cpu_id:>3}{:17}{vcpu_id:>3}{:17}{apic_id:>3}", "", "");
        }
        s.push('\n');

        s.push_str("# Invoking ACRN device model\n");
        s.push_str("dm_params=(\n");
        for param in &self.dm_parameters {
            let _ = writeln!(s, "    {param}");
        }
        s.push_str(")\n\n");

        s.push_str("echo \"Launch device model with parameters: ${dm_params[@]}\"\n");
        s.push_str("acrn-dm \"${dm_params[@]}\"\n\n");

        s.push_str("# Deinitializing\n");
        for command in &self.deinit_commands {
            let _ = writeln!(s, "{command}");
        }

        s
    }

    /// Render and write the script to `path`.
    pub fn write_to_file(&self, path: &Path, template: &ScriptTemplate) -> LaunchResult<()> {
        std::fs::write(path, self.render(template))?;
        tracing::info!(
            "Successfully generated launch script {} for VM '{}'.",
            path.display(),
            self.vm_name
        );
        Ok(())
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}
