//! Launch script generation for ACRN post-launched VMs.
//!
//! Reads a board inventory and a scenario description and writes one
//! `acrn-dm` launch script per post-launched VM.
//!
//! ```text
//! generator::generate
//!   └─ per VM: launch::generate_for_vm
//!        ├─ vbdf::SlotAllocator      (virtual PCI slots)
//!        ├─ inference::OptionInference (passthrough quirks)
//!        ├─ cpu::CpuMapper           (native CPU → APIC id)
//!        └─ script::LaunchScript     (rendered artifact)
//! ```

pub mod cpu;
pub mod document;
pub mod errors;
pub mod generator;
pub mod inference;
pub mod launch;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod script;
pub mod vbdf;

pub use document::{Element, TreeNode};
pub use errors::{LaunchError, LaunchResult};
pub use generator::{generate, run};
pub use launch::{VmLaunch, generate_for_vm};
pub use options::{GenerationReport, GeneratorOptions};
pub use script::{LaunchScript, ScriptTemplate};
