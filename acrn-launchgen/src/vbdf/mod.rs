//! Virtual PCI slot (vBDF) bookkeeping for one VM.
//!
//! Every VM gets a private virtual bus with 32 device slots. A handful of
//! them have a fixed meaning; the rest are handed out in ascending order by
//! [`SlotAllocator`].
//!
//! ```text
//!  0        host bridge
//!  1        LPC
//!  2        integrated/discrete GPU (passthrough or virtual)
//!  3 ..= 30 fungible
//!  31       LPC bridge required by GPU passthrough
//! ```

mod allocator;

pub use allocator::SlotAllocator;

/// Highest slot number on a virtual bus.
pub const MAX_SLOT: u8 = 31;

/// Slots with a fixed purpose. Never drawn from the fungible pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedSlot {
    HostBridge,
    Lpc,
    Gpu,
    LpcBridge,
}

impl ReservedSlot {
    pub const ALL: [ReservedSlot; 4] = [
        ReservedSlot::HostBridge,
        ReservedSlot::Lpc,
        ReservedSlot::Gpu,
        ReservedSlot::LpcBridge,
    ];

    pub const fn slot(self) -> u8 {
        match self {
            ReservedSlot::HostBridge => 0,
            ReservedSlot::Lpc => 1,
            ReservedSlot::Gpu => 2,
            ReservedSlot::LpcBridge => 31,
        }
    }

    pub const fn purpose(self) -> &'static str {
        match self {
            ReservedSlot::HostBridge => "virtual host bridge",
            ReservedSlot::Lpc => "virtual LPC",
            ReservedSlot::Gpu => "integrated or discrete GPU",
            ReservedSlot::LpcBridge => "LPC bridge for GPU passthrough",
        }
    }

    /// Reservation covering `slot`, if any.
    pub fn of(slot: u8) -> Option<ReservedSlot> {
        Self::ALL.into_iter().find(|r| r.slot() == slot)
    }

    /// Fixed address of the device placed in this slot (function 0).
    pub const fn bdf(self) -> VirtualBdf {
        VirtualBdf::with_function(self.slot(), 0)
    }
}

/// Slots available to [`SlotAllocator::allocate`], in ascending order.
pub fn fungible_slots() -> impl Iterator<Item = u8> {
    (0..=MAX_SLOT).filter(|slot| ReservedSlot::of(*slot).is_none())
}

/// Position of a device on a VM's virtual bus, as written into the launch script.
///
/// Allocated devices are written as the bare slot number; fixed platform
/// devices carry an explicit function (`0:0`, `1:0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualBdf {
    pub slot: u8,
    pub function: Option<u8>,
}

impl VirtualBdf {
    pub const fn allocated(slot: u8) -> Self {
        Self {
            slot,
            function: None,
        }
    }

    pub const fn with_function(slot: u8, function: u8) -> Self {
        Self {
            slot,
            function: Some(function),
        }
    }

    /// Extract the slot from a `bus:device.function` string such as `00:0c.0`.
    ///
    /// The device segment is hexadecimal.
    pub fn parse_slot(vbdf: &str) -> Option<u8> {
        let device = vbdf.split(':').nth(1)?.split('.').next()?;
        u8::from_str_radix(device.trim(), 16)
            .ok()
            .filter(|slot| *slot <= MAX_SLOT)
    }
}

impl std::fmt::Display for VirtualBdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.function {
            Some(function) => write!(f, "{}:{}", self.slot, function),
            None => write!(f, "{}", self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fungible_range_excludes_reservations() {
        let slots: Vec<u8> = fungible_slots().collect();
        assert_eq!(slots.first(), Some(&3));
        assert_eq!(slots.last(), Some(&30));
        assert_eq!(slots.len(), 28);
        for reserved in ReservedSlot::ALL {
            assert!(!slots.contains(&reserved.slot()), "{}", reserved.purpose());
        }
    }

    #[test]
    fn test_reserved_lookup() {
        assert_eq!(ReservedSlot::of(2), Some(ReservedSlot::Gpu));
        assert_eq!(ReservedSlot::of(31), Some(ReservedSlot::LpcBridge));
        assert_eq!(ReservedSlot::of(7), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ReservedSlot::HostBridge.bdf().to_string(), "0:0");
        assert_eq!(ReservedSlot::Lpc.bdf().to_string(), "1:0");
        assert_eq!(VirtualBdf::allocated(12).to_string(), "12");
    }

    #[test]
    fn test_parse_slot_reads_hex_device() {
        assert_eq!(VirtualBdf::parse_slot("00:05.0"), Some(5));
        assert_eq!(VirtualBdf::parse_slot("00:1e.0"), Some(30));
        assert_eq!(VirtualBdf::parse_slot("00:zz.0"), None);
        assert_eq!(VirtualBdf::parse_slot("0005"), None);
        assert_eq!(VirtualBdf::parse_slot("00:20.0"), None);
    }
}
