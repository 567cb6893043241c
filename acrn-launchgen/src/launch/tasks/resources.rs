//! Task: CPU, memory and firmware resources.

use crate::cpu::CpuMapper;
use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;

pub const OVMF_PARAM: &str = "--ovmf /usr/share/acrn/bios/OVMF.fd";

/// Pins the VM to the local APIC ids of its CPU affinity set.
pub struct CpuAffinityTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for CpuAffinityTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        let cpus = ctx.vm.find_texts(".//cpu_affinity//pcpu_id");
        let lapic_ids = CpuMapper::new(ctx.board).lapic_ids(cpus, &ctx.vm_name);
        if !lapic_ids.is_empty() {
            let ids: Vec<String> = lapic_ids.iter().map(u32::to_string).collect();
            ctx.script.add_dynamic_dm_parameter("add_cpus", ids.join(" "));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cpu_affinity"
    }
}

/// Guest memory size, plus software SRAM for real-time VMs.
pub struct MemoryTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for MemoryTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        let size = ctx.require(ctx.vm, ".//memory/size")?;
        ctx.script.add_plain_dm_parameter(format!("-m {size}M"));

        // SSRAM is a scenario-wide switch.
        if ctx.scenario.has_text("//SSRAM_ENABLED", "y") && ctx.is_rtvm() {
            ctx.script.add_plain_dm_parameter("--ssram");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct BootloaderTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for BootloaderTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        if ctx.vm.has_text(".//vbootloader", "y") {
            ctx.script.add_plain_dm_parameter(OVMF_PARAM);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "bootloader"
    }
}
