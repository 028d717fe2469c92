//! JSON Coverage Report Formatter
//!
//! Machine-readable dump of the run: summaries, per-line flags, and functions.
//! Source text is not repeated here beyond each line's content.

use super::sorted_functions;
use crate::coverage::data::{
    CoverageRun, FileSummary, FunctionRecord, LineRecord, RunSummary,
};
use crate::result::FirmoResult;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct JsonReport<'a> {
    generator: &'static str,
    version: &'static str,
    summary: &'a RunSummary,
    files: BTreeMap<&'a str, JsonFile<'a>>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    summary: &'a FileSummary,
    functions: Vec<&'a FunctionRecord>,
    lines: &'a [LineRecord],
}

/// JSON report generator
#[derive(Debug)]
pub struct JsonFormatter<'a> {
    run: &'a CoverageRun,
    pretty: bool,
}

impl<'a> JsonFormatter<'a> {
    /// Create a new JSON formatter producing indented output
    #[must_use]
    pub const fn new(run: &'a CoverageRun) -> Self {
        Self { run, pretty: true }
    }

    /// Emit compact single-line JSON
    #[must_use]
    pub const fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Serialize the run
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn generate(&self) -> FirmoResult<String> {
        let report = JsonReport {
            generator: "firmo",
            version: env!("CARGO_PKG_VERSION"),
            summary: &self.run.summary,
            files: self
                .run
                .files
                .iter()
                .map(|(path, file)| {
                    (
                        path.as_str(),
                        JsonFile {
                            summary: &file.summary,
                            functions: sorted_functions(file),
                            lines: &file.lines,
                        },
                    )
                })
                .collect(),
        };
        let mut output = if self.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        output.push('\n');
        Ok(output)
    }
}
