use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use acrn_launchgen::GeneratorOptions;
use acrn_launchgen::logging::{LogConfig, init_logging};

#[derive(Debug, Parser)]
#[command(name = "acrn-launchgen")]
#[command(about = "Generate acrn-dm launch scripts for post-launched VMs", version)]
struct Cli {
    /// XML file summarizing characteristics of the target board.
    #[arg(long)]
    board: PathBuf,

    /// XML file specifying the scenario to be set up.
    #[arg(long)]
    scenario: PathBuf,

    /// Post-launched VM id whose launch script is generated, or 0 for all
    /// post-launched VMs.
    #[arg(long = "user_vmid", default_value_t = 0)]
    user_vm_id: u32,

    /// Directory where generated scripts are placed.
    #[arg(long, default_value = acrn_launchgen::options::DEFAULT_OUT_DIR)]
    out: PathBuf,

    /// Launch script template replacing the built-in one.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Also write logs to this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print a JSON report of the written scripts to stdout.
    #[arg(long)]
    json: bool,

    /// Obsolete. Accepted and ignored.
    #[arg(long, hide = true)]
    launch: Option<String>,
}

impl Cli {
    fn to_options(&self) -> GeneratorOptions {
        let options = GeneratorOptions::new(&self.board, &self.scenario)
            .with_user_vm_id(self.user_vm_id)
            .with_out_dir(&self.out);
        match &self.template {
            Some(template) => options.with_template(template),
            None => options,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(&LogConfig {
        log_dir: cli.log_dir.clone(),
        ..LogConfig::default()
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.launch.is_some() {
        tracing::warn!("--launch is obsolete and has no effect");
    }

    let options = cli.to_options();
    let report = acrn_launchgen::run(&options).with_context(|| {
        format!(
            "generating launch scripts from {} and {}",
            options.board.display(),
            options.scenario.display()
        )
    })?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{json}");
    }
    Ok(())
}
