//! File/Path Resolver
//!
//! Decides whether a file reported by the runtime takes part in coverage.
//! Include/exclude globs are compiled once per run and decisions are cached
//! per raw path, since the question is asked on every line event of every
//! file in the process.

use super::path::{normalize_path, normalize_path_with_base, relative_to};
use crate::config::ConfigStore;
use crate::result::{FirmoError, FirmoResult};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Files that are never tracked, whatever the configuration says
pub const HARD_EXCLUDED: &[&str] = &[
    // framework internals
    "**/firmo.lua",
    "**/lust-next.lua",
    "**/lib/coverage/**",
    "**/lib/tools/**",
    "**/lib/assertion/**",
    "**/lib/mocking/**",
    // vendored code
    "**/vendor/**",
    "**/lua_modules/**",
    "**/.luarocks/**",
    "**/deps/**",
    // runner entry points
    "**/run_tests.lua",
    "**/scripts/runner.lua",
];

/// Include pattern used when nothing else is configured
pub const DEFAULT_INCLUDE: &str = "**/*.lua";

/// Which files to track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingConfig {
    /// Track every executed source file that is not hard-excluded
    pub track_all_executed: bool,
    /// Globs a file must match (at least one)
    pub include: Vec<String>,
    /// Globs a file must not match
    pub exclude: Vec<String>,
    /// Directory that relative patterns are anchored to; the working
    /// directory when unset
    pub root: Option<String>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            track_all_executed: false,
            include: vec![DEFAULT_INCLUDE.to_string()],
            exclude: Vec::new(),
            root: None,
        }
    }
}

impl TrackingConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set track-all mode
    #[must_use]
    pub fn with_track_all_executed(mut self, enabled: bool) -> Self {
        self.track_all_executed = enabled;
        self
    }

    /// Replace the include globs
    #[must_use]
    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the exclude globs
    #[must_use]
    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Anchor relative patterns at `root`
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Read `coverage.*` from the shared store.
    ///
    /// Returns the configuration plus `true` when the defaults had to be used
    /// because the store was missing or held malformed values.
    #[must_use]
    pub fn from_store(store: Option<&ConfigStore>) -> (Self, bool) {
        let Some(store) = store else {
            return (Self::default(), true);
        };
        match Self::try_from_store(store) {
            Ok(config) => (config, false),
            Err(e) => {
                debug!(error = %e, "coverage configuration malformed");
                (Self::default(), true)
            }
        }
    }

    fn try_from_store(store: &ConfigStore) -> FirmoResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            track_all_executed: store
                .get("coverage.trackAllExecuted")?
                .unwrap_or(defaults.track_all_executed),
            include: store.get("coverage.include")?.unwrap_or(defaults.include),
            exclude: store.get("coverage.exclude")?.unwrap_or(defaults.exclude),
            root: store.get("coverage.root")?,
        })
    }
}

/// Options shared by every coverage glob: `*` and `?` stay within one path
/// segment, only `**` crosses directories.
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compile one coverage glob.
///
/// Backslashes become forward slashes, and leading `./` or `/` is dropped so
/// patterns line up with the root-relative candidates they are matched
/// against.
///
/// # Errors
///
/// Returns error if the pattern is not a valid glob
pub fn compile_pattern(pattern: &str) -> FirmoResult<Pattern> {
    let body = pattern_body(pattern);
    Pattern::new(&body).map_err(|e| FirmoError::Config {
        path: pattern.to_string(),
        message: e.to_string(),
    })
}

fn pattern_body(pattern: &str) -> String {
    let pattern = pattern.trim().replace('\\', "/");
    let mut body = pattern.as_str();
    loop {
        if let Some(rest) = body.strip_prefix("./") {
            body = rest;
        } else if let Some(rest) = body.strip_prefix('/') {
            body = rest;
        } else {
            break;
        }
    }
    body.to_string()
}

fn compile_all(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match compile_pattern(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, error = %e, "ignoring invalid coverage pattern");
                None
            }
        })
        .collect()
}

fn matches_any(set: &[Pattern], candidate: &str) -> bool {
    set.iter()
        .any(|pattern| pattern.matches_with(candidate, MATCH_OPTIONS))
}

/// Compiled tracking decision with a per-path cache
#[derive(Debug)]
pub struct PathResolver {
    config: TrackingConfig,
    cwd: String,
    root: String,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    hard_excluded: Vec<Pattern>,
    decisions: HashMap<String, Option<Arc<str>>>,
}

impl PathResolver {
    /// Compile `config`. Patterns are matched against paths relative to its
    /// root (or the working directory).
    #[must_use]
    pub fn new(config: TrackingConfig) -> Self {
        let cwd = normalize_path(".");
        let root = match &config.root {
            Some(root) => normalize_path_with_base(root, &cwd),
            None => cwd.clone(),
        };
        let hard: Vec<String> = HARD_EXCLUDED.iter().map(|p| (*p).to_string()).collect();
        Self {
            include: compile_all(&config.include),
            exclude: compile_all(&config.exclude),
            hard_excluded: compile_all(&hard),
            cwd,
            root,
            config,
            decisions: HashMap::new(),
        }
    }

    /// The configuration this resolver was built from
    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Directory patterns are anchored to
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Normalize a runtime-reported `path` against the working directory
    #[must_use]
    pub fn normalize(&self, path: &str) -> String {
        normalize_path_with_base(path, &self.cwd)
    }

    /// Normalize `path` against the pattern root
    #[must_use]
    pub fn anchor(&self, path: &str) -> String {
        normalize_path_with_base(path, &self.root)
    }

    /// Decide whether `path` is tracked
    #[must_use]
    pub fn should_track(&self, path: &str) -> bool {
        self.evaluate(&self.normalize(path))
    }

    /// Cached form of [`should_track`](Self::should_track) for the hot path.
    ///
    /// Returns the normalized path when tracked.
    pub fn resolve(&mut self, raw_path: &str) -> Option<Arc<str>> {
        if let Some(decision) = self.decisions.get(raw_path) {
            return decision.clone();
        }
        let normalized = self.normalize(raw_path);
        let decision = self.evaluate(&normalized).then(|| Arc::from(normalized));
        self.decisions.insert(raw_path.to_string(), decision.clone());
        decision
    }

    /// Forget cached decisions
    pub fn clear_cache(&mut self) {
        self.decisions.clear();
    }

    fn evaluate(&self, normalized: &str) -> bool {
        let candidate = self.candidate(normalized);
        if matches_any(&self.hard_excluded, candidate) {
            return false;
        }
        if self.config.track_all_executed {
            return true;
        }
        matches_any(&self.include, candidate) && !matches_any(&self.exclude, candidate)
    }

    /// Root-relative form for files under the root, the absolute path
    /// without its leading separator otherwise
    fn candidate<'a>(&self, normalized: &'a str) -> &'a str {
        relative_to(normalized, &self.root).unwrap_or_else(|| normalized.trim_start_matches('/'))
    }
}

/// One-off decision without caching
#[must_use]
pub fn should_track(path: &str, config: &TrackingConfig) -> bool {
    PathResolver::new(config.clone()).should_track(path)
}
