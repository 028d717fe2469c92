//! Run command handler

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use console::Style;
use firmo::coverage::{normalize_path, relative_to, CoverageRun, CoverageTracker, RunSummary};
use firmo::{ConfigStore, LuaInstrumentation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the run command
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let store = Arc::new(build_store(args)?);
    let port = Arc::new(LuaInstrumentation::default());
    let tracker = CoverageTracker::new(port.clone()).with_config(store);

    if !tracker.start(None) {
        return Err(firmo::FirmoError::invalid_state("coverage tracking already running").into());
    }
    let failures = run_scripts(&port, &args.scripts, args.keep_going, config);
    tracker.stop();

    let data = tracker
        .get_report_data()
        .ok_or_else(|| firmo::FirmoError::invalid_state("no coverage data after stop"))?;
    if let Some(issue) = &data.issue {
        warn!(error = %issue, "coverage data is inconsistent; reports may be off");
    }

    if !config.verbosity.is_quiet() {
        print!(
            "{}",
            format_summary_table(&data.run, &display_root(), config.color.should_color())
        );
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output_dir));
    write_reports(config, &tracker, &output_dir, &args.format)?;

    if let Some(failure) = failures.into_iter().next() {
        return Err(failure);
    }
    check_threshold(&data.run.summary, args.threshold)
}

/// Load the configuration file (if any) and apply command-line overrides
pub fn build_store(args: &RunArgs) -> CliResult<ConfigStore> {
    let store = match &args.config {
        Some(path) => ConfigStore::load_file(path).map_err(|e| {
            CliError::config(format!("cannot load {}: {e}", path.display()))
        })?,
        None => ConfigStore::new(),
    };
    if !args.include.is_empty() {
        store.set("coverage.include", &args.include)?;
    }
    if !args.exclude.is_empty() {
        store.set("coverage.exclude", &args.exclude)?;
    }
    if args.track_all {
        store.set("coverage.trackAllExecuted", true)?;
    }
    if let Some(root) = &args.root {
        store.set("coverage.root", root)?;
    }
    Ok(store)
}

fn run_scripts(
    port: &LuaInstrumentation,
    scripts: &[PathBuf],
    keep_going: bool,
    config: &CliConfig,
) -> Vec<CliError> {
    let mut failures = Vec::new();
    for script in scripts {
        if config.verbosity.is_verbose() {
            println!("Running {}...", script.display());
        }
        info!(script = %script.display(), "running script");
        if let Err(e) = port.run_file(script) {
            warn!(script = %script.display(), error = %e, "script failed");
            failures.push(CliError::script_failed(format!("{}: {e}", script.display())));
            if !keep_going {
                break;
            }
        }
    }
    failures
}

fn write_reports(
    config: &CliConfig,
    tracker: &CoverageTracker,
    dir: &Path,
    formats: &[String],
) -> CliResult<()> {
    let formats: Vec<&str> = formats.iter().map(String::as_str).collect();
    let outcome = tracker.generate_reports(dir, &formats);
    if !config.verbosity.is_quiet() {
        for path in &outcome.written {
            println!("Report written to: {}", path.display());
        }
    }
    match outcome.error {
        Some(e) if !outcome.success => Err(CliError::report_generation(e.to_string())),
        Some(e) => {
            eprintln!("Warning: {e}");
            Ok(())
        }
        None => Ok(()),
    }
}

/// Fail when overall line coverage is below `threshold`
pub fn check_threshold(summary: &RunSummary, threshold: Option<f64>) -> CliResult<()> {
    match threshold {
        Some(required) if summary.line_coverage_percent < required => {
            Err(CliError::ThresholdNotMet {
                actual: summary.line_coverage_percent,
                required,
            })
        }
        _ => Ok(()),
    }
}

fn display_root() -> String {
    normalize_path(".")
}

/// Render the per-file coverage table printed after a run
#[must_use]
pub fn format_summary_table(run: &CoverageRun, root: &str, use_color: bool) -> String {
    let header = Style::new().bold().force_styling(use_color);
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        header.apply_to(format!(
            "{:<48} {:>8} {:>8} {:>8} {:>10}",
            "File", "Lines", "Line %", "Funcs", "Assert %"
        ))
    ));
    out.push_str(&format!("{}\n", "-".repeat(86)));

    for (path, file) in &run.files {
        let s = &file.summary;
        let name = relative_to(path, root).unwrap_or(path);
        out.push_str(&format!(
            "{:<48} {:>8} {} {:>8} {:>9.1}%\n",
            name,
            format!("{}/{}", s.executed_lines, s.executable_lines),
            percent_style(s.line_coverage_percent, use_color)
                .apply_to(format!("{:>7.1}%", s.line_coverage_percent)),
            format!("{}/{}", s.executed_functions, s.total_functions),
            s.assertion_coverage_percent,
        ));
    }

    let s = &run.summary;
    out.push_str(&format!("{}\n", "-".repeat(86)));
    out.push_str(&format!(
        "{:<48} {:>8} {} {:>8} {:>9.1}%\n",
        header.apply_to(format!("Total ({} files)", s.total_files)),
        format!("{}/{}", s.executed_lines, s.executable_lines),
        percent_style(s.line_coverage_percent, use_color)
            .apply_to(format!("{:>7.1}%", s.line_coverage_percent)),
        format!("{}/{}", s.executed_functions, s.total_functions),
        s.assertion_coverage_percent,
    ));
    out
}

fn percent_style(percent: f64, use_color: bool) -> Style {
    let style = if percent >= 80.0 {
        Style::new().green()
    } else if percent >= 50.0 {
        Style::new().yellow()
    } else {
        Style::new().red()
    };
    style.force_styling(use_color)
}
