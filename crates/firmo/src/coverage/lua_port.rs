//! Lua debug-hook adapter
//!
//! Binds the [`InstrumentationPort`] to an embedded Lua 5.4 VM. Events are
//! translated from `mlua` debug records into [`TraceEvent`]s; chunks loaded
//! from files must carry an `@path` chunk name so they map back to a file.

use super::data::FunctionKind;
use super::instrument::{EventCallback, InstrumentationPort, TraceEvent};
use crate::result::FirmoResult;
use mlua::{Debug, DebugEvent, HookTriggers, Lua, VmState};
use parking_lot::Mutex;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Instrumentation backed by `mlua` debug hooks
pub struct LuaInstrumentation {
    lua: Lua,
    current: Arc<Mutex<Option<EventCallback>>>,
}

impl fmt::Debug for LuaInstrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaInstrumentation")
            .field("installed", &self.current.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl Default for LuaInstrumentation {
    fn default() -> Self {
        Self::new(Lua::new())
    }
}

impl LuaInstrumentation {
    /// Wrap an existing VM
    #[must_use]
    pub fn new(lua: Lua) -> Self {
        Self {
            lua,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// The wrapped VM
    #[must_use]
    pub const fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Execute a Lua file with a chunk name that maps back to `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the script fails
    pub fn run_file(&self, path: &Path) -> FirmoResult<()> {
        let source = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "executing lua chunk");
        self.lua
            .load(source.as_str())
            .set_name(format!("@{}", path.display()))
            .exec()?;
        Ok(())
    }

    fn arm(&self) {
        let current = Arc::clone(&self.current);
        let triggers = HookTriggers::new().on_calls().on_returns().every_line();
        let _ = self.lua.set_hook(triggers, move |_lua, debug| {
            let callback = current.lock().clone();
            if let Some(callback) = callback {
                if let Some(event) = translate(&debug) {
                    callback(&event);
                }
            }
            Ok(VmState::Continue)
        });
    }
}

impl InstrumentationPort for LuaInstrumentation {
    fn install(&self, callback: EventCallback) -> Option<EventCallback> {
        let previous = self.current.lock().replace(callback);
        if previous.is_none() {
            self.arm();
        }
        previous
    }

    fn uninstall(&self, previous: Option<EventCallback>) {
        let clear = previous.is_none();
        *self.current.lock() = previous;
        if clear {
            self.lua.remove_hook();
        }
    }
}

fn translate(debug: &Debug<'_>) -> Option<TraceEvent> {
    match debug.event() {
        DebugEvent::Line => {
            let line = u32::try_from(debug.curr_line()).ok().filter(|l| *l > 0)?;
            Some(TraceEvent::Line {
                file: file_of(debug),
                line,
            })
        }
        event @ (DebugEvent::Call | DebugEvent::TailCall) => {
            let source = debug.source();
            // C functions and the main chunk still occupy a frame, so they are
            // reported without a file to keep call depth balanced
            let file = if source.what == "Lua" {
                source.source.as_deref().and_then(chunk_path)
            } else {
                None
            };
            let names = debug.names();
            Some(TraceEvent::Call {
                file,
                name: names.name.as_deref().map(str::to_string),
                start_line: source.line_defined.as_line(),
                end_line: source.last_line_defined.as_line(),
                kind: kind_of(names.name.is_some(), names.name_what.as_deref()),
                tail_call: matches!(event, DebugEvent::TailCall),
            })
        }
        DebugEvent::Ret => Some(TraceEvent::Return),
        _ => None,
    }
}

fn file_of(debug: &Debug<'_>) -> Option<String> {
    debug.source().source.as_deref().and_then(chunk_path)
}

/// `@path` chunk names are files; anything else was loaded from a string
fn chunk_path(source: &str) -> Option<String> {
    source.strip_prefix('@').map(str::to_string)
}

fn kind_of(named: bool, name_what: Option<&str>) -> FunctionKind {
    if !named {
        return FunctionKind::Anonymous;
    }
    match name_what {
        Some("global" | "field") => FunctionKind::Global,
        Some("local") => FunctionKind::Local,
        Some("method") => FunctionKind::Method,
        Some("upvalue") => FunctionKind::Closure,
        _ => FunctionKind::Anonymous,
    }
}

/// Line numbers as reported by different `mlua` debug accessors
trait AsLine {
    fn as_line(self) -> u32;
}

impl AsLine for i32 {
    fn as_line(self) -> u32 {
        u32::try_from(self).unwrap_or(0)
    }
}

impl AsLine for usize {
    fn as_line(self) -> u32 {
        u32::try_from(self).unwrap_or(u32::MAX)
    }
}

impl AsLine for Option<usize> {
    fn as_line(self) -> u32 {
        self.map_or(0, AsLine::as_line)
    }
}
