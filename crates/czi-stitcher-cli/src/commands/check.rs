use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use console::Style;
use czi_stitcher_core::io::bftools::check_bftools;
use czi_stitcher_core::process::find_executable;

#[derive(Args)]
pub struct CheckArgs {
    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding bfconvert
    #[arg(long)]
    pub bftools_path: Option<PathBuf>,
}

pub fn run(args: &CheckArgs) -> Result<ExitCode> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(ref dir) = args.bftools_path {
        config.bftools_path = Some(dir.clone());
    }

    let ok = Style::new().green().bold();
    let bad = Style::new().red().bold();
    let mut all_found = true;
    let mut report = |label: &str, found: std::result::Result<String, String>| {
        match found {
            Ok(detail) => println!("  {} {:<10}{}", ok.apply_to("ok"), label, detail),
            Err(detail) => {
                all_found = false;
                println!("  {} {:<10}{}", bad.apply_to("!!"), label, detail);
            }
        }
    };

    report(
        "bftools",
        check_bftools(config.bftools_path.as_deref())
            .map(|p| p.display().to_string())
            .map_err(|e| e.to_string()),
    );
    report("ashlar", locate(&config.ashlar_path));
    report("imagej", locate(&config.app_path));
    report(
        "script",
        if config.script_path.is_file() {
            Ok(config.script_path.display().to_string())
        } else {
            Err(format!("{} not found", config.script_path.display()))
        },
    );

    Ok(if all_found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn locate(program: &std::path::Path) -> std::result::Result<String, String> {
    let name = program.to_string_lossy();
    find_executable(&name, None)
        .map(|p| p.display().to_string())
        .ok_or_else(|| format!("{name} not found"))
}
