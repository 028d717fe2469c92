//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Firmo: line and function coverage for Lua scripts
#[derive(Parser, Debug)]
#[command(name = "firmo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run Lua scripts under coverage and write reports
    Run(RunArgs),

    /// Show which lines of a Lua file count as executable
    Lines(LinesArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Lua scripts to execute, in order
    #[arg(required = true)]
    pub scripts: Vec<PathBuf>,

    /// Configuration file (JSON or YAML) with a `coverage` section
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Include glob (repeatable; replaces the configured list)
    #[arg(short, long)]
    pub include: Vec<String>,

    /// Exclude glob (repeatable; replaces the configured list)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Track every executed file that is not hard-excluded
    #[arg(long)]
    pub track_all: bool,

    /// Directory relative globs are anchored to
    #[arg(long)]
    pub root: Option<String>,

    /// Report formats: html, lcov, json, cobertura
    #[arg(short, long, value_delimiter = ',', default_value = "html")]
    pub format: Vec<String>,

    /// Output directory for reports
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Fail when line coverage is below this percentage
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Keep running remaining scripts after one fails
    #[arg(long)]
    pub keep_going: bool,
}

/// Arguments for the lines command
#[derive(Parser, Debug)]
pub struct LinesArgs {
    /// Lua source file to classify
    pub file: PathBuf,

    /// Print only executable lines
    #[arg(long)]
    pub executable_only: bool,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_command() {
            let cli = Cli::parse_from(["firmo", "run", "tests/calc_test.lua"]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.scripts, vec![PathBuf::from("tests/calc_test.lua")]);
                assert_eq!(args.format, vec!["html".to_string()]);
                assert!(args.threshold.is_none());
                assert!(!args.track_all);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_requires_script() {
            assert!(Cli::try_parse_from(["firmo", "run"]).is_err());
        }

        #[test]
        fn test_parse_run_formats_comma_delimited() {
            let cli = Cli::parse_from(["firmo", "run", "a.lua", "--format", "lcov,json"]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.format, vec!["lcov".to_string(), "json".to_string()]);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_repeated_patterns() {
            let cli = Cli::parse_from([
                "firmo", "run", "a.lua", "-i", "src/**", "-i", "lib/**", "-e", "**/spec/**",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.include, vec!["src/**", "lib/**"]);
                assert_eq!(args.exclude, vec!["**/spec/**"]);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_threshold_and_output() {
            let cli = Cli::parse_from([
                "firmo",
                "run",
                "a.lua",
                "--threshold",
                "85.5",
                "-o",
                "out",
                "--track-all",
                "--keep-going",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.threshold, Some(85.5));
                assert_eq!(args.output_dir, Some(PathBuf::from("out")));
                assert!(args.track_all);
                assert!(args.keep_going);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_lines_command() {
            let cli = Cli::parse_from(["firmo", "lines", "src/calc.lua", "--executable-only"]);
            if let Commands::Lines(args) = cli.command {
                assert_eq!(args.file, PathBuf::from("src/calc.lua"));
                assert!(args.executable_only);
            } else {
                panic!("expected Lines command");
            }
        }

        #[test]
        fn test_parse_global_flags() {
            let cli = Cli::parse_from(["firmo", "-vv", "--color", "never", "lines", "x.lua"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(!cli.quiet);
        }

        #[test]
        fn test_parse_quiet_after_subcommand() {
            let cli = Cli::parse_from(["firmo", "lines", "x.lua", "-q"]);
            assert!(cli.quiet);
        }
    }

    mod color_arg_tests {
        use super::*;

        #[test]
        fn test_color_arg_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }

        #[test]
        fn test_color_arg_default() {
            assert!(matches!(ColorArg::default(), ColorArg::Auto));
        }
    }
}
