//! Lines command handler

use crate::commands::LinesArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use console::Style;
use firmo::coverage::classify_source;

/// Execute the lines command
pub fn execute_lines(config: &CliConfig, args: &LinesArgs) -> CliResult<()> {
    let source = std::fs::read_to_string(&args.file).map_err(|e| {
        CliError::invalid_argument(format!("cannot read {}: {e}", args.file.display()))
    })?;
    print!(
        "{}",
        format_lines(&source, args.executable_only, config.color.should_color())
    );
    if !config.verbosity.is_quiet() {
        let executable = classify_source(&source).into_iter().filter(|e| *e).count();
        println!(
            "\n{executable} of {} lines executable",
            source.lines().count()
        );
    }
    Ok(())
}

/// One row per source line: number, `+` for executable or blank, then text
#[must_use]
pub fn format_lines(source: &str, executable_only: bool, use_color: bool) -> String {
    let code = Style::new().green().force_styling(use_color);
    let plain = Style::new().dim().force_styling(use_color);
    let width = source.lines().count().to_string().len().max(3);

    let mut out = String::new();
    for ((idx, text), executable) in source.lines().enumerate().zip(classify_source(source)) {
        if executable_only && !executable {
            continue;
        }
        let row = format!(
            "{:>width$} {} {text}",
            idx + 1,
            if executable { '+' } else { ' ' }
        );
        let styled = if executable {
            code.apply_to(row)
        } else {
            plain.apply_to(row)
        };
        out.push_str(&format!("{styled}\n"));
    }
    out
}
