//! Launch script generation for every post-launched VM of a scenario.

use std::collections::BTreeSet;
use std::path::Path;

use crate::cpu::CpuMapper;
use crate::document::{Element, TreeNode};
use crate::errors::{LaunchError, LaunchResult};
use crate::launch::{ScriptSummary, generate_for_vm};
use crate::options::{GenerationReport, GeneratorOptions};
use crate::script::ScriptTemplate;

pub const SERVICE_VM: &str = "SERVICE_VM";
pub const PRE_LAUNCHED_VM: &str = "PRE_LAUNCHED_VM";
pub const POST_LAUNCHED_VM: &str = "POST_LAUNCHED_VM";

/// Load the documents named by `options` and generate their launch scripts.
pub fn run(options: &GeneratorOptions) -> LaunchResult<GenerationReport> {
    let board = Element::load(&options.board)?;
    let scenario = Element::load(&options.scenario)?;
    let template = match &options.template {
        Some(path) => ScriptTemplate::load(path)?,
        None => ScriptTemplate::builtin(),
    };
    generate(&board, &scenario, options, &template)
}

/// Write one launch script per selected post-launched VM into
/// `options.out_dir`.
///
/// Scripts are named after the VM's id relative to the service VM. VMs are
/// processed in scenario order and the first failing VM aborts the run.
pub fn generate<N: TreeNode>(
    board: &N,
    scenario: &N,
    options: &GeneratorOptions,
    template: &ScriptTemplate,
) -> LaunchResult<GenerationReport> {
    let vms = scenario.find_all("//vm");
    let service_vm = vms.iter().copied().find(|vm| load_order(*vm) == Some(SERVICE_VM));
    let post_vms: Vec<&N> = vms
        .iter()
        .copied()
        .filter(|vm| load_order(*vm) == Some(POST_LAUNCHED_VM))
        .collect();

    let service = match service_vm {
        Some(vm) => Some((vm_id(vm)?, vm.text_or("./name", SERVICE_VM))),
        None if !post_vms.is_empty() => {
            return Err(LaunchError::Config(
                "The scenario does not define a service VM so no launch scripts will be \
                 generated for the post-launched VMs in the scenario."
                    .to_string(),
            ));
        }
        None => None,
    };

    prepare_out_dir(&options.out_dir)?;

    let mut report = GenerationReport {
        service_vm_id: service.map(|(id, _)| id),
        scripts: Vec::new(),
    };
    let Some((service_id, service_name)) = service else {
        return Ok(report);
    };

    let cpu_table = service_cpu_table(board, &vms, service_name);
    // An id beyond the u32 range matches no VM.
    let selected = (options.user_vm_id != 0).then(|| options.user_vm_id.checked_add(service_id));
    let hv = scenario.find("//hv");

    for vm in post_vms {
        let id = vm_id(vm)?;
        if selected.is_some_and(|selected| selected != Some(id)) {
            continue;
        }

        let hv = hv.ok_or_else(|| {
            LaunchError::Config("The scenario does not define an hv section".to_string())
        })?;
        let mut launch = generate_for_vm(board, scenario, hv, vm, id)?;
        launch.script.set_cpu_table(cpu_table.iter().copied());

        let user_vm_id = id
            .checked_sub(service_id)
            .ok_or_else(|| LaunchError::invalid(&launch.vm_name, "vm/@id", &id.to_string()))?;
        let path = options
            .out_dir
            .join(format!("launch_user_vm_id{user_vm_id}.sh"));
        launch.script.write_to_file(&path, template)?;

        report.scripts.push(ScriptSummary {
            vm_id: id,
            user_vm_id,
            vm_name: launch.vm_name,
            path,
            allocated_slots: launch.allocated_slots,
        });
    }

    if let Some(selected) = selected
        && report.scripts.is_empty()
    {
        tracing::warn!(
            user_vm_id = options.user_vm_id,
            vm_id = ?selected,
            "No post-launched VM matches the requested user VM id"
        );
    }

    Ok(report)
}

fn load_order<N: TreeNode>(vm: &N) -> Option<&str> {
    vm.child_text("load_order")
}

fn vm_id<N: TreeNode>(vm: &N) -> LaunchResult<u32> {
    let name = vm.text_or("./name", "<unnamed>");
    let id = vm
        .attribute("id")
        .ok_or_else(|| LaunchError::missing(name, "vm/@id"))?;
    id.trim()
        .parse()
        .map_err(|_| LaunchError::invalid(name, "vm/@id", id))
}

/// Board CPUs left to the service VM (those no pre-launched VM claims),
/// paired with their APIC ids.
fn service_cpu_table<N: TreeNode>(board: &N, vms: &[&N], service_name: &str) -> Vec<(u32, u32)> {
    let pre_launched: BTreeSet<u32> = vms
        .iter()
        .filter(|vm| load_order(**vm) == Some(PRE_LAUNCHED_VM))
        .flat_map(|vm| vm.find_texts("./cpu_affinity//pcpu_id"))
        .filter_map(|cpu| cpu.parse().ok())
        .collect();

    let mapper = CpuMapper::new(board);
    mapper
        .native_cpus()
        .into_iter()
        .filter(|cpu| !pre_launched.contains(cpu))
        .filter_map(|cpu| {
            mapper
                .lapic_id(&cpu.to_string(), service_name)
                .map(|apic_id| (cpu, apic_id))
        })
        .collect()
}

fn prepare_out_dir(out_dir: &Path) -> LaunchResult<()> {
    if out_dir.is_file() {
        return Err(LaunchError::output_is_file(out_dir.to_path_buf()));
    }
    std::fs::create_dir_all(out_dir).map_err(|e| {
        LaunchError::Storage(format!("Cannot create output directory {}: {e}", out_dir.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r#"<acrn-config><processors>
        <thread><cpu_id>0</cpu_id><apic_id>0x0</apic_id></thread>
        <thread><cpu_id>1</cpu_id><apic_id>0x2</apic_id></thread>
        <thread><cpu_id>2</cpu_id><apic_id>0x4</apic_id></thread>
        <thread><cpu_id>3</cpu_id><apic_id>0x6</apic_id></thread>
      </processors></acrn-config>"#;

    fn scenario(vms: &str) -> Element {
        Element::parse(
            "scenario",
            &format!("<acrn-config><hv><SCHEDULER>SCHED_IORR</SCHEDULER></hv>{vms}</acrn-config>"),
        )
        .unwrap()
    }

    fn post_vm(id: u32, name: &str) -> String {
        format!(
            "<vm id=\"{id}\"><load_order>POST_LAUNCHED_VM</load_order><name>{name}</name>\
             <memory><size>512</size></memory></vm>"
        )
    }

    const SERVICE: &str =
        "<vm id=\"1\"><load_order>SERVICE_VM</load_order><name>SOS</name></vm>";

    #[test]
    fn test_scripts_named_relative_to_service_vm() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&format!("{SERVICE}{}{}", post_vm(2, "A"), post_vm(3, "B")));
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new("", "").with_out_dir(dir.path().join("out"));

        let report = generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap();

        assert_eq!(report.service_vm_id, Some(1));
        let names: Vec<_> = report.scripts.iter().map(|s| (s.user_vm_id, s.vm_name.as_str())).collect();
        assert_eq!(names, vec![(1, "A"), (2, "B")]);
        assert!(dir.path().join("out/launch_user_vm_id1.sh").is_file());
        assert!(dir.path().join("out/launch_user_vm_id2.sh").is_file());
    }

    #[test]
    fn test_selector_picks_single_vm() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&format!("{SERVICE}{}{}", post_vm(2, "A"), post_vm(3, "B")));
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new("", "")
            .with_out_dir(dir.path())
            .with_user_vm_id(2);

        let report = generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap();
        assert_eq!(report.scripts.len(), 1);
        assert_eq!(report.scripts[0].vm_id, 3);
        assert!(!dir.path().join("launch_user_vm_id1.sh").exists());
    }

    #[test]
    fn test_selector_beyond_id_range_matches_nothing() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&format!("{SERVICE}{}", post_vm(2, "A")));
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new("", "")
            .with_out_dir(dir.path())
            .with_user_vm_id(u32::MAX);

        let report = generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap();
        assert!(report.scripts.is_empty());
        assert!(!dir.path().join("launch_user_vm_id1.sh").exists());
    }

    #[test]
    fn test_missing_service_vm_is_fatal() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&post_vm(1, "A"));
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new("", "").with_out_dir(dir.path().join("out"));

        let err = generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap_err();
        assert!(matches!(err, LaunchError::Config(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_no_vms_writes_nothing() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario("");
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new("", "").with_out_dir(dir.path().join("out"));

        let report = generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap();
        assert!(report.scripts.is_empty());
        assert_eq!(report.service_vm_id, None);
    }

    #[test]
    fn test_output_path_that_is_a_file() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&format!("{SERVICE}{}", post_vm(2, "A")));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("output");
        std::fs::write(&file, "").unwrap();
        let options = GeneratorOptions::new("", "").with_out_dir(&file);

        let err = generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap_err();
        assert!(err.to_string().contains("File exists"));
    }

    #[test]
    fn test_service_cpu_table_excludes_pre_launched_cpus() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&format!(
            "<vm id=\"0\"><load_order>PRE_LAUNCHED_VM</load_order><cpu_affinity>\
               <pcpu><pcpu_id>2</pcpu_id></pcpu></cpu_affinity></vm>{SERVICE}"
        ));
        let vms = scenario.find_all("//vm");
        assert_eq!(service_cpu_table(&board, &vms, "SOS"), vec![(0, 0), (1, 2), (3, 6)]);
    }

    #[test]
    fn test_cpu_table_is_rendered() {
        let board = Element::parse("board", BOARD).unwrap();
        let scenario = scenario(&format!("{SERVICE}{}", post_vm(2, "A")));
        let dir = tempfile::tempdir().unwrap();
        let options = GeneratorOptions::new("", "").with_out_dir(dir.path());

        generate(&board, &scenario, &options, &ScriptTemplate::builtin()).unwrap();
        let text = std::fs::read_to_string(dir.path().join("launch_user_vm_id1.sh")).unwrap();
        assert!(text.contains("#     3                   3                   6\n"));
        assert!(text.contains("scheduler='SCHED_IORR'\n"));
    }
}
