//! Coverage report formatters
//!
//! Every formatter borrows a finished [`CoverageRun`] and renders it to a
//! string. Output is deterministic: files come out in path order, lines in
//! ascending order, functions by start line then id.

pub mod cobertura;
pub mod html;
pub mod json;
pub mod lcov;

pub use cobertura::CoberturaFormatter;
pub use html::HtmlFormatter;
pub use json::JsonFormatter;
pub use lcov::LcovFormatter;

use super::data::{FileRecord, FunctionRecord};

/// Escape text for XML and HTML attribute or body content
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Functions of `file` ordered by start line, then id
pub(crate) fn sorted_functions(file: &FileRecord) -> Vec<&FunctionRecord> {
    let mut functions: Vec<&FunctionRecord> = file.functions.values().collect();
    functions.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then_with(|| a.id.cmp(&b.id))
    });
    functions
}
