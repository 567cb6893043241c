//! Task: PCI virtual UARTs.

use super::claim_declared_slots;
use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;
use crate::vbdf::VirtualBdf;

/// vUART index and declared slot of every PCI connection with this VM as an
/// endpoint. Indices count all of this VM's connections, PCI or not, from 1.
pub(super) fn pci_endpoints<N: TreeNode>(
    ctx: &VmPass<'_, N>,
) -> LaunchResult<Vec<(usize, Option<VirtualBdf>)>> {
    let connections: Vec<_> = ctx
        .scenario
        .find_all("//vuart_connection")
        .into_iter()
        .filter_map(|conn| {
            conn.find_all("./endpoint")
                .into_iter()
                .find(|ep| ep.child_text("vm_name") == Some(ctx.vm_name.as_str()))
                .map(|endpoint| (conn, endpoint))
        })
        .collect();

    let mut out = Vec::new();
    for (idx, (conn, endpoint)) in connections.into_iter().enumerate() {
        if conn.child_text("type") != Some("pci") {
            continue;
        }
        let vbdf = ctx.declared_slot(endpoint.child_text("vbdf"), "vuart_connection/endpoint/vbdf")?;
        out.push((idx + 1, vbdf));
    }
    Ok(out)
}

/// The PCI console vUART (index 0) and every PCI vUART connection that has
/// this VM as an endpoint (index 1 onwards, in declaration order).
pub struct VuartTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for VuartTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        // The console takes a pool slot, so connection slots go first.
        claim_declared_slots(ctx)?;

        if ctx.vm.has_text(".//console_vuart", "PCI") {
            ctx.add_virtual_device("uart", None, "vuart_idx:0")?;
        }
        for (idx, vbdf) in pci_endpoints(ctx)? {
            ctx.add_virtual_device("uart", vbdf, &format!("vuart_idx:{idx}"))?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "vuart"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::testing::{deferred_args, parse, pass};

    fn connection(kind: &str, peer: &str, vbdf: &str) -> String {
        format!(
            "<vuart_connection><type>{kind}</type>\
               <endpoint><vm_name>{peer}</vm_name><vbdf>00:10.0</vbdf></endpoint>\
               <endpoint><vm_name>VM1</vm_name><vbdf>{vbdf}</vbdf></endpoint>\
             </vuart_connection>"
        )
    }

    #[test]
    fn test_console_and_connections_are_indexed() {
        let body = format!(
            "<vuart_connections>{}{}{}</vuart_connections>\
             <vm id=\"1\"><name>VM1</name><console_vuart>PCI</console_vuart></vm>",
            connection("pci", "Service_VM", "00:06.0"),
            connection("legacy", "VM2", "00:07.0"),
            connection("pci", "VM2", "00:08.0"),
        );
        let (board, scenario) = parse("", &body);
        let mut ctx = pass(&board, &scenario);
        VuartTask.run(&mut ctx).unwrap();

        assert_eq!(
            deferred_args(&ctx, "add_virtual_device"),
            vec!["3 uart vuart_idx:0", "6 uart vuart_idx:1", "8 uart vuart_idx:3"]
        );
        assert!(!ctx.allocator.is_free(6));
        assert!(ctx.allocator.is_free(7));
    }

    #[test]
    fn test_console_skips_slot_declared_by_connection() {
        let body = format!(
            "{}<vm id=\"1\"><name>VM1</name><console_vuart>PCI</console_vuart></vm>",
            connection("pci", "Service_VM", "00:03.0"),
        );
        let (board, scenario) = parse("", &body);
        let mut ctx = pass(&board, &scenario);
        VuartTask.run(&mut ctx).unwrap();

        assert_eq!(
            deferred_args(&ctx, "add_virtual_device"),
            vec!["4 uart vuart_idx:0", "3 uart vuart_idx:1"]
        );
        assert_eq!(ctx.allocator.issued(), &[4]);
    }

    #[test]
    fn test_connections_without_this_vm_are_ignored() {
        let body = "<vuart_connection><type>pci</type>\
                      <endpoint><vm_name>VM2</vm_name><vbdf>00:06.0</vbdf></endpoint>\
                    </vuart_connection><vm id=\"1\"><name>VM1</name></vm>";
        let (board, scenario) = parse("", body);
        let mut ctx = pass(&board, &scenario);
        VuartTask.run(&mut ctx).unwrap();
        assert!(ctx.script.dm_parameters().is_empty());
    }
}
