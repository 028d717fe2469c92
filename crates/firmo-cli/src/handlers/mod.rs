//! Command handlers - kept out of main.rs for testability
//!
//! Each handler module holds the execution logic for one CLI command plus
//! the pure rendering helpers it prints through.

pub mod lines;
pub mod run;

pub use lines::{execute_lines, format_lines};
pub use run::{build_store, check_threshold, execute_run, format_summary_table};
