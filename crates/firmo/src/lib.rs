//! Firmo: Coverage Engine for Lua Test Suites
//!
//! Firmo records which lines of Lua source ran during a test session, which
//! functions were entered, and which lines were additionally verified by a
//! passing assertion. At the end of a session it classifies every line of
//! every tracked file and renders HTML, LCOV, JSON or Cobertura reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    FIRMO Architecture                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Lua VM     │    │ Coverage   │    │ Reports    │            │
//! │   │ (debug     │───►│ Tracker    │───►│ html/lcov/ │            │
//! │   │  hooks)    │    │            │    │ json/xml   │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │         ▲                 ▲                                      │
//! │   Instrumentation   ConfigStore                                  │
//! │        Port         (coverage.*)                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use firmo::coverage::{CoverageTracker, SyntheticPort, TraceEvent};
//! use firmo::ConfigStore;
//! use std::sync::Arc;
//!
//! let port = Arc::new(SyntheticPort::new());
//! let config = Arc::new(ConfigStore::new());
//! config.set("coverage.trackAllExecuted", true).unwrap();
//!
//! let tracker = CoverageTracker::new(port.clone()).with_config(config);
//! assert!(tracker.start(None));
//! port.emit(&TraceEvent::Return);
//! assert!(tracker.stop());
//! assert_eq!(tracker.get_summary().map(|s| s.total_files), Some(0));
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod config;

/// Lua line and function coverage
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]
pub mod coverage;

pub mod fs;
mod result;

pub use config::{ChangeListener, ConfigStore};
pub use coverage::{
    CoverageRun, CoverageTracker, InstrumentationPort, ReportFormat, ReportOutcome,
    TrackingConfig,
};
pub use fs::{FileSystem, OsFileSystem};
pub use result::{FirmoError, FirmoResult};

#[cfg(feature = "lua")]
pub use coverage::LuaInstrumentation;
#[cfg(feature = "lua")]
pub use mlua;
