//! Per-VM enumeration context.

use serde::Serialize;

use crate::document::TreeNode;
use crate::errors::{LaunchError, LaunchResult};
use crate::inference::OptionInference;
use crate::script::LaunchScript;
use crate::vbdf::{ReservedSlot, SlotAllocator, VirtualBdf};

/// VM name used when the scenario does not give one.
pub const DEFAULT_VM_NAME: &str = "ACRN Post-Launched VM";

/// VM type used when the scenario does not give one.
pub const DEFAULT_VM_TYPE: &str = "STANDARD_VM";

pub const RTVM: &str = "RTVM";

/// Thresholds passed to `add_interrupt_storm_monitor`.
pub const INTR_STORM_MONITOR_ARGS: &str = "10000 10 1 100";

/// State shared by the enumeration tasks of one VM.
///
/// Documents are borrowed read-only; the script, allocator and rule table
/// belong to this pass alone.
pub struct VmPass<'a, N: TreeNode> {
    pub board: &'a N,
    /// Root of the scenario document.
    pub scenario: &'a N,
    /// The scenario's `hv` section.
    pub hv: &'a N,
    /// The scenario's `vm` element being processed.
    pub vm: &'a N,
    pub vm_id: u32,
    pub vm_name: String,
    pub script: LaunchScript,
    pub allocator: SlotAllocator,
    pub inference: OptionInference,
}

impl<'a, N: TreeNode> VmPass<'a, N> {
    pub fn new(board: &'a N, scenario: &'a N, hv: &'a N, vm: &'a N, vm_id: u32) -> Self {
        let vm_name = vm.text_or("./name", DEFAULT_VM_NAME).to_string();
        Self {
            board,
            scenario,
            hv,
            vm,
            vm_id,
            script: LaunchScript::new(vm_name.clone()),
            allocator: SlotAllocator::new(vm_name.clone()),
            inference: OptionInference::default(),
            vm_name,
        }
    }

    pub fn vm_type(&self) -> &'a str {
        self.vm.text_or(".//vm_type", DEFAULT_VM_TYPE)
    }

    pub fn is_rtvm(&self) -> bool {
        self.vm_type() == RTVM
    }

    /// Text at `path` below `node`, or a missing-value error naming this VM.
    pub fn require<'n>(&self, node: &'n N, path: &str) -> LaunchResult<&'n str> {
        node.find_text(path)
            .ok_or_else(|| LaunchError::missing(&self.vm_name, path))
    }

    /// Parse a scenario-declared `bus:device.function` position. Absent text
    /// means the device takes the next free slot.
    pub fn declared_slot(&self, text: Option<&str>, path: &str) -> LaunchResult<Option<VirtualBdf>> {
        let Some(text) = text else {
            return Ok(None);
        };
        VirtualBdf::parse_slot(text)
            .map(|slot| Some(VirtualBdf::allocated(slot)))
            .ok_or_else(|| LaunchError::invalid(&self.vm_name, path, text))
    }

    /// Add an emulated or mediated device.
    ///
    /// With `vbdf` the device goes to that scenario-assigned position and
    /// the slot is claimed from the pool; without it the next free slot is
    /// used.
    pub fn add_virtual_device(
        &mut self,
        kind: &str,
        vbdf: Option<VirtualBdf>,
        options: &str,
    ) -> LaunchResult<VirtualBdf> {
        if kind.contains("virtio") && self.is_rtvm() {
            self.script.add_plain_dm_parameter("--virtio_poll 1000000");
        }

        let vbdf = match vbdf {
            Some(vbdf) => {
                self.allocator.release(vbdf.slot);
                vbdf
            }
            None => VirtualBdf::allocated(self.allocator.allocate_next()?),
        };

        self.script
            .add_dynamic_dm_parameter("add_virtual_device", format!("{vbdf} {kind} {options}"));
        Ok(vbdf)
    }

    /// Add a physical PCI device at `bus:dev.fun`. Returns the virtual slot.
    pub fn add_passthrough_device(&mut self, bus: u8, dev: u8, fun: u8) -> LaunchResult<u8> {
        let device = find_pci_device(self.board, bus, dev, fun);
        if device.is_none() {
            tracing::debug!(
                vm = %self.vm_name,
                "Passthrough device {:02x}:{:02x}.{} not described by the board",
                bus,
                dev,
                fun
            );
        }

        let options = self.inference.infer(device, self.vm);
        let slot = self.allocator.allocate(device, &options)?;

        self.script.add_dynamic_dm_parameter(
            "add_passthrough_device",
            format!("{slot} 0000:{bus:02x}:{dev:02x}.{fun} {}", options.join(",")),
        );

        // Every passthrough device except the GPU gets interrupt storm
        // monitoring.
        if slot != ReservedSlot::Gpu.slot() {
            self.script
                .add_dynamic_dm_parameter("add_interrupt_storm_monitor", INTR_STORM_MONITOR_ARGS);
        }

        Ok(slot)
    }
}

/// Board node of the PCI function `bus:dev.fun`.
pub fn find_pci_device<N: TreeNode>(board: &N, bus: u8, dev: u8, fun: u8) -> Option<&N> {
    let bus_address = format!("0x{bus:x}");
    let device_address = format!("0x{:x}", (u32::from(dev) << 16) | u32::from(fun));

    board
        .find_all("//bus")
        .into_iter()
        .filter(|node| {
            node.attribute("type") == Some("pci")
                && node.attribute("address") == Some(bus_address.as_str())
        })
        .flat_map(|node| node.children())
        .find(|device| {
            device.name() == "device" && device.attribute("address") == Some(device_address.as_str())
        })
}

/// Outcome of one VM's enumeration pass.
#[derive(Debug, Clone)]
pub struct VmLaunch {
    pub vm_id: u32,
    pub vm_name: String,
    pub script: LaunchScript,
    /// Slots drawn from the fungible pool, in allocation order.
    pub allocated_slots: Vec<u8>,
}

/// Summary of one written launch script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    pub vm_id: u32,
    pub user_vm_id: u32,
    pub vm_name: String,
    pub path: std::path::PathBuf,
    pub allocated_slots: Vec<u8>,
}
