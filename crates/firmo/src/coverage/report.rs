//! Report generation
//!
//! Maps format names to formatters and writes `coverage-report.<format>` files
//! into an output directory. One bad format never stops the others.

use super::data::CoverageRun;
use super::formatters::{CoberturaFormatter, HtmlFormatter, JsonFormatter, LcovFormatter};
use crate::fs::FileSystem;
use crate::result::{FirmoError, FirmoResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Base name shared by every report file
pub const REPORT_FILE_STEM: &str = "coverage-report";

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportFormat {
    /// Annotated single-page HTML
    Html,
    /// LCOV tracefile
    Lcov,
    /// Machine-readable JSON
    Json,
    /// Cobertura XML
    Cobertura,
}

impl ReportFormat {
    /// All formats, in output order
    pub const ALL: [Self; 4] = [Self::Html, Self::Lcov, Self::Json, Self::Cobertura];

    /// Lowercase name, also used as the file extension
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Lcov => "lcov",
            Self::Json => "json",
            Self::Cobertura => "cobertura",
        }
    }

    /// `coverage-report.<format>`
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{REPORT_FILE_STEM}.{}", self.name())
    }

    /// Render `run` in this format
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn render(self, run: &CoverageRun) -> FirmoResult<String> {
        match self {
            Self::Html => Ok(HtmlFormatter::new(run).generate()),
            Self::Lcov => Ok(LcovFormatter::new(run).generate()),
            Self::Json => JsonFormatter::new(run).generate(),
            Self::Cobertura => Ok(CoberturaFormatter::new(run).generate()),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportFormat {
    type Err = FirmoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FirmoError::UnsupportedFormat {
                formats: vec![s.to_string()],
            })
    }
}

/// Result of a report generation request
#[derive(Debug)]
pub struct ReportOutcome {
    /// At least one report was written
    pub success: bool,
    /// Files written, in request order
    pub written: Vec<PathBuf>,
    /// Everything that went wrong, combined
    pub error: Option<FirmoError>,
}

impl ReportOutcome {
    /// Outcome for a request that wrote nothing
    #[must_use]
    pub const fn failed(error: FirmoError) -> Self {
        Self {
            success: false,
            written: Vec::new(),
            error: Some(error),
        }
    }
}

/// Write one report per requested format into `dir`.
///
/// Duplicate format names are written once. Unsupported names are reported
/// together in a single [`FirmoError::UnsupportedFormat`] while the supported
/// ones are still written; write failures are folded into a
/// [`FirmoError::ReportGeneration`].
pub fn generate_reports(
    fs: &dyn FileSystem,
    run: &CoverageRun,
    dir: &Path,
    formats: &[&str],
) -> ReportOutcome {
    if formats.is_empty() {
        return ReportOutcome::failed(FirmoError::invalid_argument(
            "no report formats requested",
        ));
    }

    let mut selected: Vec<ReportFormat> = Vec::new();
    let mut unsupported: Vec<String> = Vec::new();
    for name in formats {
        match name.parse::<ReportFormat>() {
            Ok(format) if !selected.contains(&format) => selected.push(format),
            Ok(_) => {}
            Err(_) => unsupported.push((*name).to_string()),
        }
    }

    let mut failures: Vec<String> = Vec::new();
    let mut written = Vec::new();

    if !selected.is_empty() {
        if let Err(e) = fs.ensure_directory_exists(dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create report directory");
            return ReportOutcome::failed(FirmoError::report_generation(format!(
                "cannot create {}: {e}",
                dir.display()
            )));
        }
    }

    for format in selected {
        let path = dir.join(format.file_name());
        match format
            .render(run)
            .and_then(|content| fs.write_file(&path, &content))
        {
            Ok(()) => {
                debug!(format = %format, path = %path.display(), "wrote coverage report");
                written.push(path);
            }
            Err(e) => {
                warn!(format = %format, error = %e, "coverage report failed");
                failures.push(format!("{format}: {e}"));
            }
        }
    }

    let error = match (unsupported.is_empty(), failures.is_empty()) {
        (true, true) => None,
        (false, true) => Some(FirmoError::UnsupportedFormat {
            formats: unsupported,
        }),
        (true, false) => Some(FirmoError::report_generation(failures.join("; "))),
        (false, false) => {
            let unsupported = FirmoError::UnsupportedFormat {
                formats: unsupported,
            };
            failures.insert(0, unsupported.to_string());
            Some(FirmoError::report_generation(failures.join("; ")))
        }
    };
    if let Some(e) = &error {
        warn!(error = %e, "report generation incomplete");
    }

    ReportOutcome {
        success: !written.is_empty(),
        written,
        error,
    }
}
