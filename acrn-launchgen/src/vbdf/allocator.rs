//! Fungible slot pool for one VM's virtual bus.

use std::collections::BTreeSet;

use super::{ReservedSlot, fungible_slots};
use crate::document::TreeNode;
use crate::errors::{LaunchError, LaunchResult};

/// Class code of a VGA-compatible controller (integrated or discrete GPU).
pub const VGA_CLASS_CODE: &str = "0x030000";

/// Passthrough option marking an integrated GPU.
pub const IGD_OPTION: &str = "igd";

/// Hands out virtual slots for one VM.
///
/// The pool only shrinks: a slot leaves it when allocated or explicitly
/// claimed with [`release`](Self::release) and never comes back.
#[derive(Debug)]
pub struct SlotAllocator {
    vm_name: String,
    free: BTreeSet<u8>,
    issued: Vec<u8>,
}

impl SlotAllocator {
    pub fn new(vm_name: impl Into<String>) -> Self {
        Self {
            vm_name: vm_name.into(),
            free: fungible_slots().collect(),
            issued: Vec::new(),
        }
    }

    /// Slot for a device described by `device` (a board PCI node) and its
    /// passthrough `options`.
    ///
    /// GPUs always land in the reserved GPU slot without touching the pool.
    /// Everything else takes the lowest free fungible slot.
    pub fn allocate<N: TreeNode>(&mut self, device: Option<&N>, options: &[String]) -> LaunchResult<u8> {
        let is_vga = device
            .and_then(|node| node.child_text("class"))
            .is_some_and(|class| class == VGA_CLASS_CODE);
        let is_igd = options.iter().any(|opt| opt == IGD_OPTION);

        if is_vga || is_igd {
            tracing::debug!(vm = %self.vm_name, slot = ReservedSlot::Gpu.slot(), "Using reserved GPU slot");
            return Ok(ReservedSlot::Gpu.slot());
        }

        let slot = self
            .free
            .pop_first()
            .ok_or_else(|| LaunchError::SlotsExhausted {
                vm: self.vm_name.clone(),
            })?;
        self.issued.push(slot);
        tracing::debug!(vm = %self.vm_name, slot, "Allocated virtual slot");
        Ok(slot)
    }

    /// Allocate for a device with no board description or options.
    pub fn allocate_next(&mut self) -> LaunchResult<u8> {
        self.allocate::<crate::document::Element>(None, &[])
    }

    /// Take `slot` out of the pool so later allocations skip it.
    ///
    /// Used for slots the scenario assigns explicitly. Claiming a slot that
    /// is not in the pool does nothing.
    pub fn release(&mut self, slot: u8) {
        if self.free.remove(&slot) {
            tracing::debug!(vm = %self.vm_name, slot, "Claimed scenario-assigned slot");
        }
    }

    /// Slots drawn from the pool so far, in allocation order.
    pub fn issued(&self) -> &[u8] {
        &self.issued
    }

    pub fn remaining(&self) -> usize {
        self.free.len()
    }

    pub fn is_free(&self, slot: u8) -> bool {
        self.free.contains(&slot)
    }
}
