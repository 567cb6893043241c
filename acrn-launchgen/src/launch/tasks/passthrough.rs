//! Task: Passthrough PCI devices.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;

/// `bus:device.function` at the start of a `pci_devs` entry, e.g.
/// `00:14.0 USB controller`.
static BDF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{2}):([0-1][0-9a-f])\.([0-7])").expect("passthrough BDF pattern is valid")
});

pub struct PassthroughTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for PassthroughTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        for entry in ctx.vm.find_texts(".//pci_devs/*") {
            let Some((bus, dev, fun)) = parse_bdf(entry) else {
                tracing::debug!(vm = %ctx.vm_name, entry, "Skipping malformed passthrough entry");
                continue;
            };
            ctx.add_passthrough_device(bus, dev, fun)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "passthrough_devices"
    }
}

fn parse_bdf(entry: &str) -> Option<(u8, u8, u8)> {
    let caps = BDF_PATTERN.captures(entry)?;
    let field = |i: usize| u8::from_str_radix(caps.get(i)?.as_str(), 16).ok();
    Some((field(1)?, field(2)?, field(3)?))
}
