//! Task: Inter-VM shared memory (ivshmem).
//!
//! Every scenario-assigned slot of this step and of the PCI vUART step is
//! claimed before the first region without one draws from the pool.

use super::claim_declared_slots;
use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;
use crate::vbdf::VirtualBdf;

/// Region providers and the backend prefix each one uses.
const PROVIDERS: &[(&str, &str)] = &[("Device Model", "dm"), ("Hypervisor", "hv")];

/// Regions listing this VM as a member, Device Model regions first, with the
/// backend prefix and the slot the member entry declares.
pub(super) fn memberships<'a, N: TreeNode>(
    ctx: &VmPass<'a, N>,
) -> LaunchResult<Vec<(&'static str, &'a N, Option<VirtualBdf>)>> {
    let regions = ctx.scenario.find_all("//IVSHMEM_REGION");
    let mut out = Vec::new();
    for &(provider, backend) in PROVIDERS {
        for &region in regions.iter().filter(|r| r.child_text("PROVIDED_BY") == Some(provider)) {
            let Some(member) = region
                .find_all(".//IVSHMEM_VM")
                .into_iter()
                .find(|m| m.child_text("VM_NAME") == Some(ctx.vm_name.as_str()))
            else {
                continue;
            };
            let vbdf = ctx.declared_slot(member.child_text("VBDF"), "IVSHMEM_VM/VBDF")?;
            out.push((backend, region, vbdf));
        }
    }
    Ok(out)
}

pub struct SharedMemoryTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for SharedMemoryTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        claim_declared_slots(ctx)?;

        for (backend, region, vbdf) in memberships(ctx)? {
            let name = ctx.require(region, "./NAME")?;
            let size = ctx.require(region, "./IVSHMEM_SIZE")?;
            ctx.add_virtual_device("ivshmem", vbdf, &format!("{backend}:/{name},{size}"))?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "shared_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LaunchError;
    use crate::launch::testing::{deferred_args, parse, pass};

    fn region(name: &str, provider: &str, members: &[(&str, &str)]) -> String {
        let members: String = members
            .iter()
            .map(|(vm, vbdf)| format!("<IVSHMEM_VM><VM_NAME>{vm}</VM_NAME><VBDF>{vbdf}</VBDF></IVSHMEM_VM>"))
            .collect();
        format!(
            "<IVSHMEM_REGION><NAME>{name}</NAME><PROVIDED_BY>{provider}</PROVIDED_BY>\
             <IVSHMEM_SIZE>2</IVSHMEM_SIZE><IVSHMEM_VMS>{members}</IVSHMEM_VMS></IVSHMEM_REGION>"
        )
    }

    #[test]
    fn test_dm_regions_come_before_hv_regions() {
        let body = format!(
            "<IVSHMEM>{}{}</IVSHMEM>\
             <vm id=\"1\"><name>VM1</name></vm>",
            region("hv_shm", "Hypervisor", &[("Service_VM", "00:05.0"), ("VM1", "00:0a.0")]),
            region("dm_shm", "Device Model", &[("VM1", "00:0b.0")]),
        );
        let (board, scenario) = parse("", &body);
        let mut ctx = pass(&board, &scenario);
        SharedMemoryTask.run(&mut ctx).unwrap();

        assert_eq!(
            deferred_args(&ctx, "add_virtual_device"),
            vec!["11 ivshmem dm:/dm_shm,2", "10 ivshmem hv:/hv_shm,2"]
        );
        assert!(!ctx.allocator.is_free(10));
        assert!(!ctx.allocator.is_free(11));
        assert!(ctx.allocator.issued().is_empty());
    }

    #[test]
    fn test_undeclared_member_skips_slots_of_later_regions() {
        let body = format!(
            "<IVSHMEM>{}{}</IVSHMEM>\
             <vuart_connection><type>pci</type>\
               <endpoint><vm_name>VM1</vm_name><vbdf>00:04.0</vbdf></endpoint>\
             </vuart_connection>\
             <vm id=\"1\"><name>VM1</name></vm>",
            "<IVSHMEM_REGION><NAME>a</NAME><PROVIDED_BY>Device Model</PROVIDED_BY>\
               <IVSHMEM_SIZE>2</IVSHMEM_SIZE><IVSHMEM_VMS><IVSHMEM_VM><VM_NAME>VM1</VM_NAME>\
               </IVSHMEM_VM></IVSHMEM_VMS></IVSHMEM_REGION>",
            region("b", "Hypervisor", &[("VM1", "00:03.0")]),
        );
        let (board, scenario) = parse("", &body);
        let mut ctx = pass(&board, &scenario);
        SharedMemoryTask.run(&mut ctx).unwrap();

        assert_eq!(
            deferred_args(&ctx, "add_virtual_device"),
            vec!["5 ivshmem dm:/a,2", "3 ivshmem hv:/b,2"]
        );
        assert_eq!(ctx.allocator.issued(), &[5]);
        assert!(!ctx.allocator.is_free(4));
    }

    #[test]
    fn test_regions_of_other_vms_are_skipped() {
        let body = format!(
            "{}<vm id=\"1\"><name>VM1</name></vm>",
            region("shm", "Hypervisor", &[("VM2", "00:05.0")])
        );
        let (board, scenario) = parse("", &body);
        let mut ctx = pass(&board, &scenario);
        SharedMemoryTask.run(&mut ctx).unwrap();
        assert!(ctx.script.dm_parameters().is_empty());
        assert!(ctx.allocator.is_free(5));
    }

    #[test]
    fn test_unparsable_vbdf_is_an_error() {
        let body = format!(
            "{}<vm id=\"1\"><name>VM1</name></vm>",
            region("shm", "Device Model", &[("VM1", "garbage")])
        );
        let (board, scenario) = parse("", &body);
        let mut ctx = pass(&board, &scenario);
        let err = SharedMemoryTask.run(&mut ctx).unwrap_err();
        assert!(matches!(err, LaunchError::InvalidValue { ref value, .. } if value == "garbage"));
    }
}
