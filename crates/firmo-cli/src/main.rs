//! Firmo CLI: run Lua scripts under coverage
//!
//! ## Usage
//!
//! ```bash
//! firmo run tests/calc_test.lua                  # HTML report in coverage-reports/
//! firmo run t.lua --format lcov,json -o out      # Several formats
//! firmo run t.lua -i "src/**" --threshold 80     # Fail below 80% line coverage
//! firmo lines src/calc.lua                       # Which lines count as executable
//! ```

use clap::Parser;
use firmo_cli::{
    handlers::{execute_lines, execute_run},
    Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(config.verbosity);

    match cli.command {
        Commands::Run(args) => execute_run(&config, &args),
        Commands::Lines(args) => execute_lines(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// `RUST_LOG` wins; otherwise the level follows `-q`/`-v`
fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
