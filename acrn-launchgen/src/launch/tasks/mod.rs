//! Enumeration steps.
//!
//! Each task covers one group of `acrn-dm` parameters. They are listed here
//! in the order the plan runs them.

mod finalize;
mod mediated;
mod passthrough;
mod platform;
mod resources;
mod shared_memory;
mod vm_profile;
mod vuart;

pub(crate) use finalize::{MiscFlagsTask, VmNameTask};
pub(crate) use mediated::MediatedDevicesTask;
pub(crate) use passthrough::PassthroughTask;
pub(crate) use platform::PlatformDevicesTask;
pub(crate) use resources::{BootloaderTask, CpuAffinityTask, MemoryTask};
pub(crate) use shared_memory::SharedMemoryTask;
pub(crate) use vm_profile::{ModuleProbeTask, VmProfileTask};
pub(crate) use vuart::VuartTask;

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;

/// Take every slot the scenario assigns to this VM's shared memory regions
/// and PCI vUART connections out of the pool. Claiming again is a no-op.
fn claim_declared_slots<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    let regions = shared_memory::memberships(ctx)?;
    let vuarts = vuart::pci_endpoints(ctx)?;

    let declared = regions
        .iter()
        .filter_map(|(_, _, vbdf)| *vbdf)
        .chain(vuarts.iter().filter_map(|(_, vbdf)| *vbdf));
    for vbdf in declared {
        ctx.allocator.release(vbdf.slot);
    }
    Ok(())
}
