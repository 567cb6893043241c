//! Task: Trailing flags and the VM name.

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;

pub const LOGGER_SETTINGS: &str = "console=4 kmsg=3 disk=5";

/// Real-time flags and logger settings.
pub struct MiscFlagsTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for MiscFlagsTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        if ctx.is_rtvm() {
            ctx.script.add_plain_dm_parameter("--rtvm");
            if ctx.vm.has_text(".//lapic_passthrough", "y") {
                ctx.script.add_plain_dm_parameter("--lapic_pt");
            }
        }
        ctx.script
            .add_dynamic_dm_parameter("add_logger_settings", LOGGER_SETTINGS);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "misc_flags"
    }
}

/// The VM name is the last positional `acrn-dm` argument.
pub struct VmNameTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for VmNameTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        let name = ctx.vm_name.clone();
        ctx.script.add_plain_dm_parameter(name);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "vm_name"
    }
}
