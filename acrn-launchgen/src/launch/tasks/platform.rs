//! Task: Emulated platform devices.

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;
use crate::vbdf::ReservedSlot;

/// LPC (with the legacy vUART0 console) and the host bridge, both at their
/// reserved slots.
pub struct PlatformDevicesTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for PlatformDevicesTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        // Real-time VMs boot without legacy platform devices.
        if !ctx.is_rtvm() {
            ctx.add_virtual_device("lpc", Some(ReservedSlot::Lpc.bdf()), "")?;
        }

        if ctx.vm.has_text(".//vuart0", "y") {
            ctx.script.add_plain_dm_parameter("-l com1,stdio");
        }

        ctx.add_virtual_device("hostbridge", Some(ReservedSlot::HostBridge.bdf()), "")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "platform_devices"
    }
}
