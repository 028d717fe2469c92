//! Line and function coverage for Lua code
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  FIRMO COVERAGE PIPELINE                                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Runtime hook → InstrumentationPort → CoverageTracker           │
//! │                                            ↓                     │
//! │        PathResolver (track?)      CoverageRun (lines, fns)      │
//! │                                            ↓  stop()             │
//! │                         Line Classifier → Summary → Formatters  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While tracking, the hook only records which lines ran and which functions
//! were entered. Deciding which lines were executable at all happens once,
//! at stop, by a lexical scan of each captured source.

mod classifier;
mod data;
pub mod formatters;
mod instrument;
#[cfg(feature = "lua")]
mod lua_port;
mod path;
mod report;
mod resolver;
mod tracker;

pub use classifier::{classify_file, classify_source, function_spans};
pub use data::{
    function_id, is_well_formed_function_id, percent, CoverageRun, FileRecord, FileSummary,
    FunctionKind, FunctionRecord, LineRecord, LineStatus, RunSummary,
};
pub use formatters::{CoberturaFormatter, HtmlFormatter, JsonFormatter, LcovFormatter};
pub use instrument::{EventCallback, InstrumentationPort, SyntheticPort, TraceEvent};
#[cfg(feature = "lua")]
pub use lua_port::LuaInstrumentation;
pub use path::{is_absolute, normalize_fs_path, normalize_path, normalize_path_with_base, relative_to};
pub use report::{generate_reports, ReportFormat, ReportOutcome, REPORT_FILE_STEM};
pub use resolver::{
    compile_pattern, should_track, PathResolver, TrackingConfig, DEFAULT_INCLUDE, HARD_EXCLUDED,
    MATCH_OPTIONS,
};
pub use tracker::{ActiveCall, CoverageTracker, ReportData};
