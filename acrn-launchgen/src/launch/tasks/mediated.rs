//! Task: Mediated and virtio devices.
//!
//! Device kinds are emitted in a fixed order (USB, input, console, network,
//! block, GPU, vsock), one device per scenario entry, each taking the next
//! free slot.

use std::path::Path;

use crate::document::TreeNode;
use crate::errors::LaunchResult;
use crate::launch::types::VmPass;
use crate::pipeline::PipelineTask;

/// Init command capturing the host MAC, which seeds the guest MAC addresses.
pub const MAC_CAPTURE: &str = "mac=$(cat /sys/class/net/e*/address)";

const VHOST_FRAMEWORK: &str = "Kernel based (Virtual Host)";
const CONSOLE_USE_TYPE: &str = "Virtio console";

pub struct MediatedDevicesTask;

impl<'a, N: TreeNode> PipelineTask<VmPass<'a, N>> for MediatedDevicesTask {
    fn run(&self, ctx: &mut VmPass<'a, N>) -> LaunchResult<()> {
        add_usb_controllers(ctx)?;
        add_input_devices(ctx)?;
        add_consoles(ctx)?;
        add_network_devices(ctx)?;
        add_block_devices(ctx)?;
        add_gpus(ctx)?;
        add_vsocks(ctx)
    }

    fn name(&self) -> &'static str {
        "mediated_devices"
    }
}

/// One xHCI controller per `usb_dev`; only the `bus-port` token is used.
fn add_usb_controllers<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for usb_dev in ctx.vm.find_texts(".//usb_xhci/usb_dev") {
        let bus_port = usb_dev.split(' ').next().unwrap_or(usb_dev);
        ctx.add_virtual_device("xhci", None, bus_port)?;
    }
    Ok(())
}

fn add_input_devices<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for input in ctx.vm.find_all(".//virtio_devices/input") {
        let options = match (
            input.find_text("./backend_device_file"),
            input.find_text("./id"),
        ) {
            (Some(file), Some(id)) => format!("{file},id:{id}"),
            (Some(file), None) => file.to_string(),
            (None, _) => continue,
        };
        ctx.add_virtual_device("virtio-input", None, &options)?;
    }
    Ok(())
}

fn add_consoles<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for console in ctx.vm.find_all(".//virtio_devices/console") {
        let mask = if console.find_text("./use_type") == Some(CONSOLE_USE_TYPE) {
            "@"
        } else {
            ""
        };

        let backend = console.find_text("./backend_type").unwrap_or_default();
        let options = match backend {
            "file" => {
                let path = ctx.require(console, "./output_file_path")?;
                format!("{mask}file:file_port={path}")
            }
            "tty" => {
                let path = ctx.require(console, "./tty_device_path")?;
                format!("{mask}tty:tty_port={path}")
            }
            "sock server" | "sock client" => {
                let path = ctx.require(console, "./sock_file_path")?;
                let role = backend.trim_start_matches("sock ");
                format!("{mask}socket:{}={path}:{role}", socket_stem(path))
            }
            "pty" | "stdio" => format!("{mask}{backend}:{backend}_port"),
            other => {
                tracing::warn!(vm = %ctx.vm_name, backend = other, "Skipping virtio console with unknown backend");
                continue;
            }
        };
        ctx.add_virtual_device("virtio-console", None, &options)?;
    }
    Ok(())
}

/// Port name of a socket console: the socket file name up to its first dot.
fn socket_stem(path: &str) -> &str {
    let file_name = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path);
    file_name.split('.').next().unwrap_or(file_name)
}

fn add_network_devices<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for network in ctx.vm.find_all(".//virtio_devices/network") {
        let interface = ctx.require(network, "./interface_name")?;

        let mut params = Vec::new();
        match interface.split_once(',') {
            Some((tap, rest)) => {
                params.push(format!("tap={tap}"));
                params.push(rest.to_string());
            }
            None => params.push(format!("tap={interface}")),
        }
        if network.find_text("./virtio_framework") == Some(VHOST_FRAMEWORK) {
            params.push("vhost".to_string());
        }

        ctx.script.add_init_command(MAC_CAPTURE);
        params.push(format!("mac_seed=${{mac:0:17}}-{}", ctx.vm_name));
        ctx.add_virtual_device("virtio-net", None, &params.join(","))?;
    }
    Ok(())
}

/// Block devices are either an image path or `partition:image`. The latter
/// mounts the partition before launch and unmounts it afterwards.
fn add_block_devices<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for block in ctx.vm.find_texts(".//virtio_devices/block") {
        let Some((partition, image)) = block.split_once(':') else {
            ctx.add_virtual_device("virtio-blk", None, block)?;
            continue;
        };

        let base = Path::new(partition)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(partition);
        let var = format!("dir_{base}");

        ctx.script.add_init_command(format!("{var}=`mount_partition {partition}`"));
        let options = format!("${{{var}}}/{}", image.trim_start_matches('/'));
        ctx.add_virtual_device("virtio-blk", None, &options)?;
        ctx.script.add_deinit_command(format!("unmount_partition ${{{var}}}"));
    }
    Ok(())
}

fn add_gpus<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for gpu in ctx.vm.find_all(".//virtio_devices/gpu") {
        let display_type = gpu.find_text("./display_type");
        let mut params = Vec::new();
        for display in gpu.find_all("./displays/display") {
            match display_type {
                Some("Window") => {
                    let dims = ctx.require(display, "./window_dimensions")?;
                    let h = ctx.require(display, "./horizontal_offset")?;
                    let v = ctx.require(display, "./vertical_offset")?;
                    params.push(format!("geometry={dims}+{h}+{v}"));
                }
                Some("Full screen") => {
                    let monitor = ctx.require(display, "./monitor_id")?;
                    params.push(format!("geometry=fullscreen:{monitor}"));
                }
                _ => {}
            }
        }
        ctx.add_virtual_device("virtio-gpu", None, &params.join(","))?;
    }
    Ok(())
}

fn add_vsocks<N: TreeNode>(ctx: &mut VmPass<'_, N>) -> LaunchResult<()> {
    for cid in ctx.vm.find_texts(".//virtio_devices/vsock") {
        ctx.add_virtual_device("vhost-vsock", None, &format!("cid={cid}"))?;
    }
    Ok(())
}
