//! Instrumentation Port
//!
//! The seam between the coverage engine and whatever execution-tracing
//! facility the host runtime offers. A port installs one callback at a time
//! and hands back the callback it displaced, so the tracker can chain through
//! it and restore it afterwards.

use super::data::FunctionKind;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// One execution event reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A new line is about to run
    Line {
        /// Backing file; `None` for code loaded from a string
        file: Option<String>,
        /// 1-based line number
        line: u32,
    },
    /// A function was entered
    Call {
        /// Backing file of the callee
        file: Option<String>,
        /// Name as seen from the call site, if any
        name: Option<String>,
        /// First line of the callee's definition
        start_line: u32,
        /// Last line of the callee's definition
        end_line: u32,
        /// Definition kind derived from the runtime's introspection
        kind: FunctionKind,
        /// The callee replaces the caller's frame
        tail_call: bool,
    },
    /// The innermost function returned
    Return,
}

impl TraceEvent {
    /// Line event for a file
    #[must_use]
    pub fn line(file: impl Into<String>, line: u32) -> Self {
        Self::Line {
            file: Some(file.into()),
            line,
        }
    }

    /// Call event for a named function in a file
    #[must_use]
    pub fn call(
        file: impl Into<String>,
        name: impl Into<String>,
        start_line: u32,
        end_line: u32,
        kind: FunctionKind,
    ) -> Self {
        Self::Call {
            file: Some(file.into()),
            name: Some(name.into()),
            start_line,
            end_line,
            kind,
            tail_call: false,
        }
    }

    /// Backing file of the event, if it has one
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Line { file, .. } | Self::Call { file, .. } => file.as_deref(),
            Self::Return => None,
        }
    }
}

/// Callback invoked for every event while installed
pub type EventCallback = Arc<dyn Fn(&TraceEvent) + Send + Sync>;

/// Abstraction over the host runtime's tracing facility
pub trait InstrumentationPort {
    /// Install `callback`, returning whichever callback it replaced
    fn install(&self, callback: EventCallback) -> Option<EventCallback>;

    /// Put `previous` back, or clear instrumentation when it is `None`
    fn uninstall(&self, previous: Option<EventCallback>);
}

/// Port driven by hand, for tests and for hosts that push events themselves
#[derive(Default)]
pub struct SyntheticPort {
    current: Mutex<Option<EventCallback>>,
}

impl fmt::Debug for SyntheticPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticPort")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl SyntheticPort {
    /// Create a port with nothing installed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a callback is installed
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Deliver `event` to the installed callback, if any
    pub fn emit(&self, event: &TraceEvent) {
        // clone out so the callback may reinstall without deadlocking
        let callback = self.current.lock().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// Deliver a sequence of events in order
    pub fn emit_all<'a, I>(&self, events: I)
    where
        I: IntoIterator<Item = &'a TraceEvent>,
    {
        for event in events {
            self.emit(event);
        }
    }
}

impl InstrumentationPort for SyntheticPort {
    fn install(&self, callback: EventCallback) -> Option<EventCallback> {
        self.current.lock().replace(callback)
    }

    fn uninstall(&self, previous: Option<EventCallback>) {
        *self.current.lock() = previous;
    }
}
