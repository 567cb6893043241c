//! Native CPU id to local APIC id resolution.

use crate::document::TreeNode;

/// Looks up processor threads in the board document.
pub struct CpuMapper<'a, N: TreeNode> {
    board: &'a N,
}

impl<'a, N: TreeNode> CpuMapper<'a, N> {
    pub fn new(board: &'a N) -> Self {
        Self { board }
    }

    /// APIC id of native CPU `cpu`, or `None` when the board does not define it.
    ///
    /// A missing CPU is not an error: it is reported as a warning naming the
    /// VM that asked for it and simply left out by the caller.
    pub fn lapic_id(&self, cpu: &str, vm_name: &str) -> Option<u32> {
        let apic_id = self
            .board
            .find_all("//processors//thread")
            .into_iter()
            .find(|thread| thread.child_text("cpu_id") == Some(cpu))
            .and_then(|thread| thread.child_text("apic_id"))
            .and_then(parse_hex);

        if apic_id.is_none() {
            tracing::warn!(
                "CPU {} is not defined in the board XML, so it can't be available to VM {}",
                cpu,
                vm_name
            );
        }
        apic_id
    }

    /// APIC ids for a set of native CPUs, deduplicated and sorted ascending.
    pub fn lapic_ids<'c>(&self, cpus: impl IntoIterator<Item = &'c str>, vm_name: &str) -> Vec<u32> {
        let mut ids: Vec<u32> = cpus
            .into_iter()
            .filter_map(|cpu| self.lapic_id(cpu, vm_name))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Every native CPU id defined by the board, sorted ascending.
    pub fn native_cpus(&self) -> Vec<u32> {
        let mut cpus: Vec<u32> = self
            .board
            .find_texts("//processors//thread//cpu_id")
            .into_iter()
            .filter_map(|id| id.parse().ok())
            .collect();
        cpus.sort_unstable();
        cpus.dedup();
        cpus
    }
}

fn parse_hex(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;

    fn board() -> Element {
        Element::parse(
            "board",
            r#"<acrn-config>
                 <processors>
                   <die id="0x0"><core id="0x0">
                     <thread id="0x0"><cpu_id>0</cpu_id><apic_id>0x0</apic_id></thread>
                     <thread id="0x1"><cpu_id>1</cpu_id><apic_id>0x2</apic_id></thread>
                   </core><core id="0x1">
                     <thread id="0x2"><cpu_id>2</cpu_id><apic_id>0x4</apic_id></thread>
                     <thread id="0x3"><cpu_id>3</cpu_id><apic_id>0x16</apic_id></thread>
                   </core></die>
                 </processors>
               </acrn-config>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lapic_id_is_hex_decoded() {
        let board = board();
        let mapper = CpuMapper::new(&board);
        assert_eq!(mapper.lapic_id("1", "vm"), Some(2));
        assert_eq!(mapper.lapic_id("3", "vm"), Some(0x16));
    }

    #[test]
    fn test_unknown_cpu_is_absent() {
        let board = board();
        let mapper = CpuMapper::new(&board);
        assert_eq!(mapper.lapic_id("9", "vm"), None);
    }

    #[test]
    fn test_lapic_ids_sorted_and_filtered() {
        let board = board();
        let mapper = CpuMapper::new(&board);
        assert_eq!(mapper.lapic_ids(["3", "9", "1", "3"], "vm"), vec![2, 0x16]);
    }

    #[test]
    fn test_native_cpus() {
        let board = board();
        assert_eq!(CpuMapper::new(&board).native_cpus(), vec![0, 1, 2, 3]);
    }
}
