//! Coverage Tracker
//!
//! Owns the tracking session: installs the execution hook through an
//! [`InstrumentationPort`], routes events into the [`CoverageRun`], and
//! finalizes the run on stop. The hook path never propagates a failure back
//! into the host runtime.

use super::classifier::classify_file;
use super::data::{CoverageRun, FileRecord, FunctionKind, RunSummary};
use super::instrument::{EventCallback, InstrumentationPort, TraceEvent};
use super::report::{generate_reports, ReportOutcome};
use super::resolver::{PathResolver, TrackingConfig};
use crate::config::ConfigStore;
use crate::fs::{FileSystem, OsFileSystem};
use crate::result::FirmoError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A function frame currently on the tracked call stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCall {
    /// Call depth the frame was entered at
    pub depth: usize,
    /// Normalized path of the defining file
    pub path: Arc<str>,
    /// Composite function id
    pub function_id: String,
}

/// Snapshot handed to reporting
#[derive(Debug)]
pub struct ReportData {
    /// The run as of the snapshot
    pub run: CoverageRun,
    /// Consistency problem found when the run was finalized
    pub issue: Option<FirmoError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Loaded,
    Failed,
}

struct TrackerState {
    running: bool,
    run: Option<CoverageRun>,
    resolver: PathResolver,
    sources: HashMap<Arc<str>, SourceState>,
    call_stack: Vec<ActiveCall>,
    depth: usize,
    previous: Option<EventCallback>,
    issue: Option<String>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            running: false,
            run: None,
            resolver: PathResolver::new(TrackingConfig::default()),
            sources: HashMap::new(),
            call_stack: Vec::new(),
            depth: 0,
            previous: None,
            issue: None,
        }
    }
}

impl TrackerState {
    fn handle(&mut self, fs: &dyn FileSystem, event: &TraceEvent) {
        match event {
            TraceEvent::Line { file, line } => {
                let Some(path) = self.track(fs, file.as_deref()) else {
                    return;
                };
                if let Some(run) = self.run.as_mut() {
                    run.mark_line_executed(&path, *line);
                }
            }
            TraceEvent::Call {
                file,
                name,
                start_line,
                end_line,
                kind,
                tail_call,
            } => {
                if *tail_call {
                    if self.call_stack.last().is_some_and(|c| c.depth == self.depth) {
                        self.call_stack.pop();
                    }
                } else {
                    self.depth += 1;
                }
                let Some(path) = self.track(fs, file.as_deref()) else {
                    return;
                };
                let name = name.as_deref().unwrap_or("");
                if let Some(function_id) = self.record_call(&path, name, *start_line, *end_line, *kind)
                {
                    self.call_stack.push(ActiveCall {
                        depth: self.depth,
                        path,
                        function_id,
                    });
                }
            }
            TraceEvent::Return => {
                if self.call_stack.last().is_some_and(|c| c.depth == self.depth) {
                    self.call_stack.pop();
                }
                self.depth = self.depth.saturating_sub(1);
            }
        }
    }

    /// Resolve and lazily load a file; `None` when it is not tracked
    fn track(&mut self, fs: &dyn FileSystem, file: Option<&str>) -> Option<Arc<str>> {
        let path = self.resolver.resolve(file?)?;
        match self.sources.get(&path).copied() {
            Some(SourceState::Loaded) => Some(path),
            Some(SourceState::Failed) => None,
            None => self.load(fs, path),
        }
    }

    fn load(&mut self, fs: &dyn FileSystem, path: Arc<str>) -> Option<Arc<str>> {
        let run = self.run.as_mut()?;
        if run.contains_file(&path) {
            self.sources.insert(Arc::clone(&path), SourceState::Loaded);
            return Some(path);
        }
        match fs.read_file(Path::new(&*path)) {
            Ok(source) => {
                run.initialize_file(&path, &source);
                self.sources.insert(Arc::clone(&path), SourceState::Loaded);
                Some(path)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "cannot read source; file skipped for this run");
                self.sources.insert(path, SourceState::Failed);
                None
            }
        }
    }

    fn record_call(
        &mut self,
        path: &str,
        name: &str,
        start_line: u32,
        end_line: u32,
        kind: FunctionKind,
    ) -> Option<String> {
        let run = self.run.as_mut()?;
        let existing = run
            .file(path)
            .and_then(|f| f.function_at(start_line, end_line))
            .map(|f| f.id.clone());
        let id = match existing {
            Some(id) => id,
            None => run.register_function(path, name, start_line, end_line, kind)?,
        };
        run.mark_function_executed(path, &id);
        Some(id)
    }

    fn finalize(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        for file in run.files.values_mut() {
            classify_file(file);
        }
        run.calculate_summary();
        self.issue = match run.validate() {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "coverage data failed validation");
                Some(e.to_string())
            }
        };
    }
}

/// Coordinates one coverage session at a time
pub struct CoverageTracker {
    port: Arc<dyn InstrumentationPort>,
    fs: Arc<dyn FileSystem>,
    config: Option<Arc<ConfigStore>>,
    state: Arc<Mutex<TrackerState>>,
}

impl fmt::Debug for CoverageTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CoverageTracker")
            .field("running", &state.running)
            .field("files", &state.run.as_ref().map_or(0, |r| r.files.len()))
            .field("depth", &state.depth)
            .finish_non_exhaustive()
    }
}

impl CoverageTracker {
    /// Create a tracker reading sources from disk
    #[must_use]
    pub fn new(port: Arc<dyn InstrumentationPort>) -> Self {
        Self {
            port,
            fs: Arc::new(OsFileSystem),
            config: None,
            state: Arc::new(Mutex::new(TrackerState::default())),
        }
    }

    /// Use a different filesystem collaborator
    #[must_use]
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Read tracking settings from `store` at every start
    #[must_use]
    pub fn with_config(mut self, store: Arc<ConfigStore>) -> Self {
        self.config = Some(store);
        self
    }

    /// Begin tracking. Adopts `initial` when given, otherwise starts a fresh
    /// run. Returns `false` if tracking is already running.
    pub fn start(&self, initial: Option<CoverageRun>) -> bool {
        let callback = {
            let mut state = self.state.lock();
            if state.running {
                warn!("coverage tracking already running");
                return false;
            }
            let (config, fell_back) = TrackingConfig::from_store(self.config.as_deref());
            if fell_back && self.config.is_some() {
                warn!("coverage configuration is malformed; using defaults");
            } else if fell_back {
                warn!("no configuration store; using default coverage settings");
            }
            state.resolver = PathResolver::new(config);
            state.sources.clear();
            state.call_stack.clear();
            state.depth = 0;
            state.issue = None;
            state.run = Some(initial.unwrap_or_default());
            state.running = true;
            self.callback()
        };

        // install outside the lock: the port may fire events synchronously
        let previous = self.port.install(callback);
        self.state.lock().previous.clone_from(&previous);
        debug!(chained = previous.is_some(), "coverage tracking started");
        true
    }

    /// Stop tracking and finalize the run. Returns `false` if not running.
    pub fn stop(&self) -> bool {
        let previous = {
            let mut state = self.state.lock();
            if !state.running {
                warn!("coverage tracking is not running");
                return false;
            }
            state.running = false;
            state.previous.take()
        };
        self.port.uninstall(previous);

        let mut state = self.state.lock();
        state.finalize();
        if let Some(run) = state.run.as_ref() {
            debug!(summary = %run.summary, "coverage tracking stopped");
        }
        true
    }

    /// Discard the run and every cache. Returns `false` while running.
    pub fn reset(&self) -> bool {
        let mut state = self.state.lock();
        if state.running {
            warn!("cannot reset coverage while tracking is running");
            return false;
        }
        state.run = None;
        state.sources.clear();
        state.resolver.clear_cache();
        state.call_stack.clear();
        state.depth = 0;
        state.issue = None;
        true
    }

    /// Whether tracking is active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Copy of the run plus any consistency issue, if a run exists
    #[must_use]
    pub fn get_report_data(&self) -> Option<ReportData> {
        let state = self.state.lock();
        let run = state.run.clone()?;
        Some(ReportData {
            run,
            issue: state.issue.clone().map(FirmoError::consistency),
        })
    }

    /// Run summary as of the last `stop`
    #[must_use]
    pub fn get_summary(&self) -> Option<RunSummary> {
        self.state.lock().run.as_ref().map(|r| r.summary.clone())
    }

    /// Copy of one file's record, looked up by any spelling of its path;
    /// relative paths are tried against the working directory, then the root
    #[must_use]
    pub fn get_file_coverage(&self, path: &str) -> Option<FileRecord> {
        let state = self.state.lock();
        let run = state.run.as_ref()?;
        run.file(path)
            .or_else(|| run.file(&state.resolver.normalize(path)))
            .or_else(|| run.file(&state.resolver.anchor(path)))
            .cloned()
    }

    /// Record that a passing assertion touched `path:line`.
    ///
    /// Relative paths are tried against the working directory first, then
    /// against the pattern root.
    pub fn mark_line_asserted(&self, path: &str, line: u32) -> bool {
        let mut state = self.state.lock();
        let cwd_form = state.resolver.normalize(path);
        let root_form = state.resolver.anchor(path);
        let Some(run) = state.run.as_mut() else {
            return false;
        };
        let key = if run.contains_file(&cwd_form) {
            cwd_form
        } else {
            root_form
        };
        run.mark_line_asserted(&key, line)
    }

    /// Frames currently on the tracked call stack, outermost first
    #[must_use]
    pub fn active_calls(&self) -> Vec<ActiveCall> {
        self.state.lock().call_stack.clone()
    }

    /// Write reports for the current run into `dir`
    pub fn generate_reports(&self, dir: &Path, formats: &[&str]) -> ReportOutcome {
        let state = self.state.lock();
        match state.run.as_ref() {
            Some(run) => generate_reports(self.fs.as_ref(), run, dir, formats),
            None => ReportOutcome::failed(FirmoError::invalid_state(
                "no coverage data; start and stop tracking first",
            )),
        }
    }

    fn callback(&self) -> EventCallback {
        let state = Arc::clone(&self.state);
        let fs = Arc::clone(&self.fs);
        Arc::new(move |event: &TraceEvent| {
            let previous = state.lock().previous.clone();
            if let Some(previous) = previous {
                previous(event);
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut state = state.lock();
                if state.running {
                    state.handle(fs.as_ref(), event);
                }
            }));
            if outcome.is_err() {
                warn!(?event, "coverage hook panicked; event dropped");
            }
        })
    }
}
