//! LCOV Report Formatter
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<start line>,<function id>
//! FNDA:<call count>,<function id>
//! FNF:<functions found>
//! FNH:<functions hit>
//! DA:<line>,<hit>
//! LF:<lines found>
//! LH:<lines hit>
//! end_of_record
//! ```
//!
//! Functions are keyed by their `name:start-end` id so that two anonymous
//! functions in one file stay distinct. Only executable lines get a `DA`
//! record. Lines carry a 0/1 hit flag since
//! the hook records whether a line ran, not how often.

use super::sorted_functions;
use crate::coverage::data::CoverageRun;
use std::fmt::Write;

/// LCOV format report generator
#[derive(Debug)]
pub struct LcovFormatter<'a> {
    run: &'a CoverageRun,
    test_name: Option<String>,
}

impl<'a> LcovFormatter<'a> {
    /// Create a new LCOV formatter over a finished run
    #[must_use]
    pub const fn new(run: &'a CoverageRun) -> Self {
        Self {
            run,
            test_name: None,
        }
    }

    /// Set the test name for the report
    #[must_use]
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    /// Generate LCOV format report as a string
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "TN:{}", self.test_name.as_deref().unwrap_or(""));

        for (path, file) in &self.run.files {
            let _ = writeln!(output, "SF:{path}");

            let functions = sorted_functions(file);
            for function in &functions {
                let _ = writeln!(output, "FN:{},{}", function.start_line, function.id);
            }
            for function in &functions {
                let _ = writeln!(output, "FNDA:{},{}", function.call_count, function.id);
            }
            let _ = writeln!(output, "FNF:{}", functions.len());
            let _ = writeln!(
                output,
                "FNH:{}",
                functions.iter().filter(|f| f.executed).count()
            );

            let mut found = 0;
            let mut hit = 0;
            for line in file.lines.iter().filter(|l| l.counts_as_executable()) {
                let count = u8::from(line.executed);
                let _ = writeln!(output, "DA:{},{count}", line.line_number);
                found += 1;
                hit += usize::from(line.executed);
            }
            let _ = writeln!(output, "LF:{found}");
            let _ = writeln!(output, "LH:{hit}");

            output.push_str("end_of_record\n");
        }

        output
    }
}
