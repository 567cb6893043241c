//! Task: Module probing and VM descriptors.

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;

pub const WINDOWS_OS: &str = "Windows OS";

/// Loads the kernel modules `acrn-dm` depends on before anything else runs.
pub struct ModuleProbeTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for ModuleProbeTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        ctx.script.add_init_command("probe_modules");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "module_probe"
    }
}

/// Guest OS flags and the `vm_type` / `scheduler` descriptors.
pub struct VmProfileTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for VmProfileTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        if ctx.vm.has_text(".//os_type", WINDOWS_OS) {
            ctx.script.add_plain_dm_parameter("--windows");
        }

        let vm_type = ctx.vm_type();
        let scheduler = ctx.require(ctx.hv, ".//SCHEDULER")?;
        ctx.script.add_vm_descriptor("vm_type", format!("'{vm_type}'"));
        ctx.script.add_vm_descriptor("scheduler", format!("'{scheduler}'"));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "vm_profile"
    }
}
