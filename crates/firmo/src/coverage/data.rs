//! Coverage Data Store
//!
//! The single authoritative model of one tracking session: files, lines,
//! functions, and the summaries derived from them.
//!
//! Every mutating operation is a safe no-op on unknown paths or lines. The
//! store is driven from inside a runtime hook, where a panic would take the
//! host test run down with it.

use super::path::normalize_path;
use crate::result::{FirmoError, FirmoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Final classification of a source line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// Blank line, comment, or pure block syntax
    NotExecutable,
    /// Executable but never ran
    NotCovered,
    /// Ran, but no assertion touched it
    Executed,
    /// Ran and was verified by a passing assertion
    Covered,
}

impl LineStatus {
    /// Status implied by a line's flags
    #[must_use]
    pub const fn resolve(is_executable: bool, executed: bool, asserted: bool) -> Self {
        match (is_executable, executed, asserted) {
            (false, _, _) => Self::NotExecutable,
            (true, false, _) => Self::NotCovered,
            (true, true, true) => Self::Covered,
            (true, true, false) => Self::Executed,
        }
    }

    /// Short lowercase label used in reports
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotExecutable => "not-executable",
            Self::NotCovered => "not-covered",
            Self::Executed => "executed",
            Self::Covered => "covered",
        }
    }
}

/// How a function was defined or reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// Global or module-level function
    Global,
    /// `local function`
    Local,
    /// Called with method syntax (`obj:method()`)
    Method,
    /// Captured closure
    Closure,
    /// No name could be determined
    #[default]
    Anonymous,
}

/// One line of a tracked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    /// 1-based line number
    pub line_number: u32,
    /// Exact source text of the line
    pub content: String,
    /// The runtime reported this line running at least once
    pub executed: bool,
    /// Set by the classifier; `None` until classified
    pub is_executable: Option<bool>,
    /// A passing assertion touched this line
    #[serde(default)]
    pub asserted: bool,
    /// Set by the classifier; `None` until classified
    pub status: Option<LineStatus>,
}

impl LineRecord {
    fn new(line_number: u32, content: &str) -> Self {
        Self {
            line_number,
            content: content.to_string(),
            executed: false,
            is_executable: None,
            asserted: false,
            status: None,
        }
    }

    /// Whether this line counts towards the executable total.
    ///
    /// Before classification a line that ran is evidently executable.
    #[must_use]
    pub fn counts_as_executable(&self) -> bool {
        self.is_executable.unwrap_or(self.executed)
    }

    /// Executable and ran
    #[must_use]
    pub fn counts_as_executed(&self) -> bool {
        self.executed && self.counts_as_executable()
    }

    /// Executable, ran, and asserted
    #[must_use]
    pub fn counts_as_covered(&self) -> bool {
        self.asserted && self.counts_as_executed()
    }
}

/// A function seen by the execution hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Composite key `name:startLine-endLine`
    pub id: String,
    /// Function name as reported by the runtime
    pub name: String,
    /// First line of the definition
    pub start_line: u32,
    /// Last line of the definition
    pub end_line: u32,
    /// Definition kind
    pub kind: FunctionKind,
    /// Called at least once
    pub executed: bool,
    /// Number of call events seen
    #[serde(default)]
    pub call_count: u64,
}

/// Build the composite function id
#[must_use]
pub fn function_id(name: &str, start_line: u32, end_line: u32) -> String {
    format!("{name}:{start_line}-{end_line}")
}

/// Check that `id` has the `name:start-end` shape with numeric bounds
#[must_use]
pub fn is_well_formed_function_id(id: &str) -> bool {
    let Some((name, range)) = id.rsplit_once(':') else {
        return false;
    };
    let Some((start, end)) = range.split_once('-') else {
        return false;
    };
    !name.is_empty() && start.parse::<u32>().is_ok() && end.parse::<u32>().is_ok()
}

/// Per-file rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    /// Lines in the captured source
    pub total_lines: usize,
    /// Lines counted as executable
    pub executable_lines: usize,
    /// Executable lines that ran
    pub executed_lines: usize,
    /// Executable lines that ran and were asserted
    pub covered_lines: usize,
    /// Functions registered
    pub total_functions: usize,
    /// Functions called at least once
    pub executed_functions: usize,
    /// `executed_lines / executable_lines`, one decimal
    pub line_coverage_percent: f64,
    /// `covered_lines / executable_lines`, one decimal
    pub assertion_coverage_percent: f64,
    /// `executed_functions / total_functions`, one decimal
    pub function_coverage_percent: f64,
}

/// Whole-run rollup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Files tracked
    pub total_files: usize,
    /// Files with at least one executed line
    pub executed_files: usize,
    /// Lines across all files
    pub total_lines: usize,
    /// Executable lines across all files
    pub executable_lines: usize,
    /// Executed executable lines across all files
    pub executed_lines: usize,
    /// Covered lines across all files
    pub covered_lines: usize,
    /// Functions across all files
    pub total_functions: usize,
    /// Executed functions across all files
    pub executed_functions: usize,
    /// `executed_lines / executable_lines`, one decimal
    pub line_coverage_percent: f64,
    /// `covered_lines / executable_lines`, one decimal
    pub assertion_coverage_percent: f64,
    /// `executed_functions / total_functions`, one decimal
    pub function_coverage_percent: f64,
}

/// Percentage rounded to one decimal; zero when there is nothing to divide by
#[must_use]
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Coverage state for one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Canonical absolute path
    pub path: String,
    /// Source text captured at first touch
    pub source: String,
    /// Lines, indexed by `line_number - 1`
    pub lines: Vec<LineRecord>,
    /// Functions keyed by composite id
    pub functions: BTreeMap<String, FunctionRecord>,
    /// Derived rollup
    pub summary: FileSummary,
}

impl FileRecord {
    /// Create a record by splitting `source` into lines
    #[must_use]
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let lines = source
            .lines()
            .enumerate()
            .map(|(idx, content)| LineRecord::new(idx as u32 + 1, content))
            .collect();
        Self {
            path: path.into(),
            source,
            lines,
            functions: BTreeMap::new(),
            summary: FileSummary::default(),
        }
    }

    /// Line by 1-based number
    #[must_use]
    pub fn line(&self, line_number: u32) -> Option<&LineRecord> {
        let idx = (line_number as usize).checked_sub(1)?;
        self.lines.get(idx)
    }

    /// Mutable line by 1-based number
    pub fn line_mut(&mut self, line_number: u32) -> Option<&mut LineRecord> {
        let idx = (line_number as usize).checked_sub(1)?;
        self.lines.get_mut(idx)
    }

    /// Function whose definition spans exactly `start..=end`
    #[must_use]
    pub fn function_at(&self, start_line: u32, end_line: u32) -> Option<&FunctionRecord> {
        self.functions
            .values()
            .find(|f| f.start_line == start_line && f.end_line == end_line)
    }

    /// Line numbers that ran, ascending
    #[must_use]
    pub fn executed_line_numbers(&self) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|l| l.executed)
            .map(|l| l.line_number)
            .collect()
    }

    /// Recompute this file's summary from its lines and functions
    pub fn calculate_summary(&mut self) {
        self.summary = self.fresh_summary();
    }

    fn fresh_summary(&self) -> FileSummary {
        let executable_lines = self.lines.iter().filter(|l| l.counts_as_executable()).count();
        let executed_lines = self.lines.iter().filter(|l| l.counts_as_executed()).count();
        let covered_lines = self.lines.iter().filter(|l| l.counts_as_covered()).count();
        let total_functions = self.functions.len();
        let executed_functions = self.functions.values().filter(|f| f.executed).count();

        FileSummary {
            total_lines: self.lines.len(),
            executable_lines,
            executed_lines,
            covered_lines,
            total_functions,
            executed_functions,
            line_coverage_percent: percent(executed_lines, executable_lines),
            assertion_coverage_percent: percent(covered_lines, executable_lines),
            function_coverage_percent: percent(executed_functions, total_functions),
        }
    }

    fn validate(&self) -> Result<(), String> {
        for line in &self.lines {
            if let Some(reason) = line_violation(line) {
                return Err(format!("{}:{}: {reason}", self.path, line.line_number));
            }
        }
        for (key, function) in &self.functions {
            if !is_well_formed_function_id(&function.id) {
                return Err(format!(
                    "{}: malformed function id '{}'",
                    self.path, function.id
                ));
            }
            if *key != function.id {
                return Err(format!(
                    "{}: function stored under '{key}' but has id '{}'",
                    self.path, function.id
                ));
            }
        }
        if self.summary != self.fresh_summary() {
            return Err(format!("{}: file summary is stale", self.path));
        }
        Ok(())
    }
}

fn line_violation(line: &LineRecord) -> Option<&'static str> {
    let executable = line.is_executable == Some(true);
    match line.status {
        None => None,
        Some(LineStatus::Covered) if !(line.executed && executable) => {
            Some("covered but not executed executable code")
        }
        Some(LineStatus::Covered) if !line.asserted => Some("covered without an assertion"),
        Some(LineStatus::Executed) if !(line.executed && executable) => {
            Some("marked executed but flags disagree")
        }
        Some(LineStatus::NotCovered) if !executable || line.executed => {
            Some("marked not-covered but flags disagree")
        }
        Some(LineStatus::NotExecutable) if executable => {
            Some("marked not-executable but classified executable")
        }
        Some(_) => None,
    }
}

/// One complete tracking session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRun {
    /// Files keyed by normalized path
    pub files: BTreeMap<String, FileRecord>,
    /// Derived rollup
    pub summary: RunSummary,
}

impl CoverageRun {
    /// Create an empty run
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// File record for `path` (any spelling that normalizes to the key)
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files
            .get(path)
            .or_else(|| self.files.get(&normalize_path(path)))
    }

    fn file_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        if self.files.contains_key(path) {
            return self.files.get_mut(path);
        }
        self.files.get_mut(&normalize_path(path))
    }

    /// Whether a record exists for `path`
    #[must_use]
    pub fn contains_file(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    /// Create the record for `path` from `source` if it does not exist yet.
    ///
    /// Returns `true` when a record was created. Repeat calls leave the first
    /// capture of the source and all execution flags untouched.
    pub fn initialize_file(&mut self, path: &str, source: &str) -> bool {
        let key = normalize_path(path);
        if self.files.contains_key(&key) {
            return false;
        }
        let record = FileRecord::new(key.clone(), source);
        debug!(path = %key, lines = record.lines.len(), "initialized coverage file");
        self.files.insert(key, record);
        true
    }

    /// Flag a line as executed. Returns `false` for unknown files or lines.
    pub fn mark_line_executed(&mut self, path: &str, line_number: u32) -> bool {
        let Some(file) = self.file_mut(path) else {
            debug!(path, line_number, "line event for untracked file");
            return false;
        };
        match file.line_mut(line_number) {
            Some(line) => {
                line.executed = true;
                true
            }
            None => {
                debug!(path, line_number, "line event beyond captured source");
                false
            }
        }
    }

    /// Flag a line as touched by a passing assertion.
    pub fn mark_line_asserted(&mut self, path: &str, line_number: u32) -> bool {
        match self.file_mut(path).and_then(|f| f.line_mut(line_number)) {
            Some(line) => {
                line.asserted = true;
                true
            }
            None => {
                debug!(path, line_number, "assertion signal for unknown line");
                false
            }
        }
    }

    /// Insert a function record, or return the id of the existing one.
    pub fn register_function(
        &mut self,
        path: &str,
        name: &str,
        start_line: u32,
        end_line: u32,
        kind: FunctionKind,
    ) -> Option<String> {
        let Some(file) = self.file_mut(path) else {
            debug!(path, name, "function registration for untracked file");
            return None;
        };
        let name = if name.is_empty() { "anonymous" } else { name };
        let id = function_id(name, start_line, end_line);
        file.functions
            .entry(id.clone())
            .or_insert_with(|| FunctionRecord {
                id: id.clone(),
                name: name.to_string(),
                start_line,
                end_line,
                kind,
                executed: false,
                call_count: 0,
            });
        Some(id)
    }

    /// Flag a registered function as called.
    pub fn mark_function_executed(&mut self, path: &str, function_id: &str) -> bool {
        match self
            .file_mut(path)
            .and_then(|f| f.functions.get_mut(function_id))
        {
            Some(function) => {
                function.executed = true;
                function.call_count = function.call_count.saturating_add(1);
                true
            }
            None => {
                debug!(path, function_id, "call event for unregistered function");
                false
            }
        }
    }

    /// Recompute every file summary and the run summary.
    pub fn calculate_summary(&mut self) {
        for file in self.files.values_mut() {
            file.calculate_summary();
        }
        self.summary = self.fresh_summary();
    }

    fn fresh_summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total_files: self.files.len(),
            ..RunSummary::default()
        };
        for file in self.files.values() {
            let fs = file.fresh_summary();
            if file.lines.iter().any(|l| l.executed) {
                summary.executed_files += 1;
            }
            summary.total_lines += fs.total_lines;
            summary.executable_lines += fs.executable_lines;
            summary.executed_lines += fs.executed_lines;
            summary.covered_lines += fs.covered_lines;
            summary.total_functions += fs.total_functions;
            summary.executed_functions += fs.executed_functions;
        }
        summary.line_coverage_percent = percent(summary.executed_lines, summary.executable_lines);
        summary.assertion_coverage_percent =
            percent(summary.covered_lines, summary.executable_lines);
        summary.function_coverage_percent =
            percent(summary.executed_functions, summary.total_functions);
        summary
    }

    /// Structural sanity check; reports the first violation found.
    pub fn validate(&self) -> FirmoResult<()> {
        for (key, file) in &self.files {
            if *key != file.path {
                return Err(FirmoError::consistency(format!(
                    "file stored under '{key}' has path '{}'",
                    file.path
                )));
            }
            file.validate().map_err(FirmoError::consistency)?;
        }
        if self.summary != self.fresh_summary() {
            return Err(FirmoError::consistency("run summary is stale"));
        }
        Ok(())
    }

    /// Fold another run into this one.
    ///
    /// Executed and asserted flags are OR-ed line by line, functions are
    /// unioned, and files only present in `other` are copied over. Sources of
    /// files already present here win. Summaries are recomputed.
    pub fn merge(&mut self, other: &CoverageRun) {
        for (path, theirs) in &other.files {
            match self.files.get_mut(path) {
                Some(ours) => {
                    for (line, their_line) in ours.lines.iter_mut().zip(&theirs.lines) {
                        line.executed |= their_line.executed;
                        line.asserted |= their_line.asserted;
                        if let Some(executable) = line.is_executable {
                            line.status = Some(LineStatus::resolve(
                                executable,
                                line.executed,
                                line.asserted,
                            ));
                        }
                    }
                    for (id, their_fn) in &theirs.functions {
                        let entry = ours
                            .functions
                            .entry(id.clone())
                            .or_insert_with(|| FunctionRecord {
                                executed: false,
                                call_count: 0,
                                ..their_fn.clone()
                            });
                        entry.executed |= their_fn.executed;
                        entry.call_count = entry.call_count.saturating_add(their_fn.call_count);
                    }
                }
                None => {
                    self.files.insert(path.clone(), theirs.clone());
                }
            }
        }
        self.calculate_summary();
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {}/{} lines ({:.1}%), {}/{} functions ({:.1}%)",
            self.total_files,
            self.executed_lines,
            self.executable_lines,
            self.line_coverage_percent,
            self.executed_functions,
            self.total_functions,
            self.function_coverage_percent
        )
    }
}
