//! Firmo CLI Library
//!
//! Command-line front end for the Firmo coverage engine: runs Lua scripts
//! under coverage and writes reports.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;

pub use commands::{Cli, ColorArg, Commands, LinesArgs, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
