//! Device enumeration for one post-launched VM.
//!
//! ## Architecture
//!
//! Enumeration is table-driven. Every VM runs the same plan against a fresh
//! [`VmPass`]; each step only appends to the pass's launch script:
//!
//! ```text
//!   1. ModuleProbe       (probe_modules init command)
//!   2. VmProfile         (--windows, vm_type / scheduler descriptors)
//!   3. CpuAffinity       (add_cpus with APIC ids)
//!   4. Memory            (-m, --ssram)
//!   5. Bootloader        (--ovmf)
//!   6. PlatformDevices   (LPC at 1:0, host bridge at 0:0)
//!   7. SharedMemory      (ivshmem at declared slots)
//!   8. Vuart             (PCI vUARTs)
//!   9. MediatedDevices   (xhci, virtio-*)
//!  10. Passthrough       (physical PCI functions)
//!  11. MiscFlags         (--rtvm, --lapic_pt, logger settings)
//!  12. VmName            (last positional argument)
//! ```
//!
//! Step 7 claims every scenario-assigned slot of steps 7 and 8 before its
//! first pool draw, so no later draw can land on a declared slot.

mod tasks;
mod types;

pub use types::{
    DEFAULT_VM_NAME, DEFAULT_VM_TYPE, INTR_STORM_MONITOR_ARGS, RTVM, ScriptSummary, VmLaunch,
    VmPass, find_pci_device,
};

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::pipeline::{BoxedTask, ExecutionPlan, PipelineExecutor};

use tasks::{
    BootloaderTask, CpuAffinityTask, MediatedDevicesTask, MemoryTask, MiscFlagsTask,
    ModuleProbeTask, PassthroughTask, PlatformDevicesTask, SharedMemoryTask, VmNameTask,
    VmProfileTask, VuartTask,
};

fn enumeration_plan<'a, N: TreeNode>() -> ExecutionPlan<VmPass<'a, N>> {
    let tasks: Vec<BoxedTask<VmPass<'a, N>>> = vec![
        Box::new(ModuleProbeTask),
        Box::new(VmProfileTask),
        Box::new(CpuAffinityTask),
        Box::new(MemoryTask),
        Box::new(BootloaderTask),
        Box::new(PlatformDevicesTask),
        Box::new(SharedMemoryTask),
        Box::new(VuartTask),
        Box::new(MediatedDevicesTask),
        Box::new(PassthroughTask),
        Box::new(MiscFlagsTask),
        Box::new(VmNameTask),
    ];
    ExecutionPlan::new(tasks)
}

/// Run the enumeration plan for `vm` and return its populated launch script.
///
/// `scenario` is the scenario root and `hv` its hypervisor section. The
/// documents are only read.
pub fn generate_for_vm<N: TreeNode>(
    board: &N,
    scenario: &N,
    hv: &N,
    vm: &N,
    vm_id: u32,
) -> LaunchResult<VmLaunch> {
    let mut pass = VmPass::new(board, scenario, hv, vm, vm_id);
    let _span = tracing::debug_span!("vm", name = %pass.vm_name, vm_id).entered();
    let metrics = PipelineExecutor::execute(enumeration_plan(), &mut pass)?;

    tracing::debug!(
        vm = %pass.vm_name,
        vm_id,
        slots = ?pass.allocator.issued(),
        total_us = metrics.total_duration_us,
        "Device enumeration complete"
    );

    Ok(VmLaunch {
        vm_id,
        allocated_slots: pass.allocator.issued().to_vec(),
        vm_name: pass.vm_name,
        script: pass.script,
    })
}
