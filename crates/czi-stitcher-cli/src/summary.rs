use std::path::PathBuf;

use console::Style;
use czi_stitcher_core::pipeline::config::PipelineConfig;
use czi_stitcher_core::pipeline::AcquisitionReport;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    path: Style,
    ok: Style,
    failed: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            path: Style::new().underlined(),
            ok: Style::new().green(),
            failed: Style::new().red().bold(),
        }
    }
}

pub fn print_run_summary(config: &PipelineConfig, inputs: &[PathBuf]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("CZI Stitcher"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(12)));
    println!();
    println!("  {:<14}{}", s.label.apply_to("Inputs"), s.value.apply_to(inputs.len()));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scratch"),
        s.path.apply_to(config.scratch_root.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Mosaics"),
        s.value.apply_to(&config.stitch.filename_format)
    );
    let flips = match (config.stitch.flip_x, config.stitch.flip_y) {
        (false, false) => "none",
        (true, false) => "x",
        (false, true) => "y",
        (true, true) => "x, y",
    };
    println!("  {:<14}{}", s.label.apply_to("Flip"), s.value.apply_to(flips));
    println!();
}

pub fn print_batch_report(reports: &[AcquisitionReport]) {
    let s = Styles::new();

    println!();
    for report in reports {
        match &report.result {
            Ok(path) => println!(
                "  {} {} -> {} {}",
                s.ok.apply_to("done  "),
                report.input.display(),
                s.path.apply_to(path.display()),
                s.label.apply_to(format!("({:.1}s)", report.elapsed.as_secs_f64()))
            ),
            Err(e) => println!(
                "  {} {}: {}",
                s.failed.apply_to("failed"),
                report.input.display(),
                e
            ),
        }
    }
    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    println!();
    println!(
        "  {} of {} acquisition(s) processed",
        s.value.apply_to(reports.len() - failed),
        reports.len()
    );
}
