use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lb_core::{BridgeError, PathExpression, Table, Value};
use mlua::{Lua, LuaOptions, MultiValue, StdLib, Value as LuaValue};
use tracing::{debug, trace, warn};

use crate::closures::{build_trampoline, ClosureHandle, ClosureRegistry};
use crate::error_map::{map_call_error, map_init_error, map_script_error, map_write_error};
use crate::marshal::{utf8_text, PullMode, Puller, Pusher};
use crate::navigator::{navigate_for_write, resolve};


pub const DEFAULT_CHUNK_NAME: &str = "bridge";
pub const DEFAULT_MAX_TABLE_DEPTH: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct InterpreterOptions {
    /// Source name shown in diagnostics.
    pub chunk_name: Option<String>,
    /// Nesting limit for tables crossing the boundary in either direction.
    pub max_table_depth: Option<usize>,
    /// Standard libraries to open. `None` opens the safe set.
    pub std_libs: Option<StdLib>,
}

/// One isolated Lua state plus the closures registered with it.
///
/// The state is created with the interpreter and closed when it is dropped (or
/// handed to [`Interpreter::close`]), which releases every table and trampoline
/// the scripts still reference. Nothing is shared between instances.
pub struct Interpreter {
    lua: Lua,
    closures: Rc<RefCell<ClosureRegistry>>,
    chunk_name: String,
    max_table_depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::from_lua(Lua::new(), InterpreterOptions::default())
    }

    pub fn with_options(options: InterpreterOptions) -> Result<Self, BridgeError> {
        let lua = match options.std_libs {
            Some(libs) => Lua::new_with(libs, LuaOptions::new()).map_err(map_init_error)?,
            None => Lua::new(),
        };
        Ok(Self::from_lua(lua, options))
    }

    fn from_lua(lua: Lua, options: InterpreterOptions) -> Self {
        let interpreter = Self {
            lua,
            closures: Rc::new(RefCell::new(ClosureRegistry::new())),
            chunk_name: options
                .chunk_name
                .unwrap_or_else(|| DEFAULT_CHUNK_NAME.to_string()),
            max_table_depth: options.max_table_depth.unwrap_or(DEFAULT_MAX_TABLE_DEPTH),
        };
        debug!(chunk = %interpreter.chunk_name, "interpreter opened");
        interpreter
    }

    fn chunk_label(&self) -> String {
        format!("={}", self.chunk_name)
    }

    /// Loads and executes `source`. The error carries the runtime's diagnostic,
    /// including failures raised by registered closures.
    pub fn run(&self, source: &str) -> Result<(), BridgeError> {
        debug!(chunk = %self.chunk_name, bytes = source.len(), "running script");
        self.lua
            .load(source)
            .set_name(self.chunk_label())
            .exec()
            .map_err(map_script_error)
    }

    /// Compiles `source` without running it. Global state is left untouched.
    pub fn validate_syntax(&self, source: &str) -> Result<(), BridgeError> {
        self.lua
            .load(source)
            .set_name(self.chunk_label())
            .into_function()
            .map(|_| ())
            .map_err(map_script_error)
    }

    /// Writes `value` at `path`, creating intermediate tables as needed. Any
    /// intermediate holding a non-table value is replaced. Writing
    /// [`Value::Nil`] clears the slot.
    pub fn write_value(&mut self, path: &str, value: impl Into<Value>) -> Result<(), BridgeError> {
        let path = PathExpression::parse(path);
        let value = value.into();
        debug!(path = %path, kind = value.type_name(), "writing value");

        let pushed = Pusher::new(&self.lua, self.max_table_depth).push(&value)?;
        self.install(&path, pushed)
    }

    fn install(&self, path: &PathExpression, value: LuaValue) -> Result<(), BridgeError> {
        let target = navigate_for_write(&self.lua, path).map_err(map_write_error)?;
        target.set(path.leaf(), value).map_err(map_write_error)
    }

    fn lookup(&self, path: &str) -> Option<LuaValue> {
        let path = PathExpression::parse(path);
        match resolve(&self.lua, &path) {
            Ok(value) => value,
            Err(error) => {
                trace!(path = %path, error = %error, "lookup failed");
                None
            }
        }
    }

    pub fn read_boolean(&self, path: &str) -> Option<bool> {
        match self.lookup(path)? {
            LuaValue::Boolean(flag) => Some(flag),
            _ => None,
        }
    }

    pub fn read_number(&self, path: &str) -> Option<f64> {
        match self.lookup(path)? {
            LuaValue::Integer(integer) => Some(integer as f64),
            LuaValue::Number(number) => Some(number),
            _ => None,
        }
    }

    /// `None` also for byte strings that are not valid UTF-8.
    pub fn read_string(&self, path: &str) -> Option<String> {
        match self.lookup(path)? {
            LuaValue::String(text) => utf8_text(&text),
            _ => None,
        }
    }

    /// Snapshots the table at `path`. `None` when the path does not resolve to a
    /// table, or when the table cannot be snapshotted (see
    /// [`Interpreter::try_read_table`]).
    pub fn read_table(&self, path: &str) -> Option<Table> {
        match self.try_read_table(path) {
            Ok(table) => table,
            Err(error) => {
                warn!(path, error = %error, "table at path could not be snapshotted");
                None
            }
        }
    }

    /// Like [`Interpreter::read_table`] but reports cyclic or too deeply nested
    /// tables instead of treating them as absent. Entries whose key or value has
    /// no host counterpart (functions, userdata) are left out of the snapshot.
    pub fn try_read_table(&self, path: &str) -> Result<Option<Table>, BridgeError> {
        let Some(LuaValue::Table(table)) = self.lookup(path) else {
            return Ok(None);
        };
        let snapshot = Puller::new(PullMode::Lenient, self.max_table_depth).pull_table(&table, 0)?;
        Ok(Some(Rc::try_unwrap(snapshot).unwrap_or_else(|shared| Table::clone(&shared))))
    }

    /// Reads whatever is at `path` if it has a host counterpart. Nil reads as
    /// absent.
    pub fn read_value(&self, path: &str) -> Option<Value> {
        let value = self.lookup(path)?;
        match Puller::new(PullMode::Lenient, self.max_table_depth).pull(value) {
            Ok(Value::Nil) => None,
            Ok(value) => Some(value),
            Err(error) => {
                trace!(path, error = %error, "value has no host counterpart");
                None
            }
        }
    }

    /// Exposes `closure` to scripts at `path`. Registering the same path again
    /// replaces the closure for every trampoline already handed out.
    pub fn register_function<F>(&mut self, path: &str, closure: F) -> Result<ClosureHandle, BridgeError>
    where
        F: Fn(Vec<Value>) -> Vec<Value> + 'static,
    {
        self.register_fallible_function(path, move |args| Ok(closure(args)))
    }

    /// Like [`Interpreter::register_function`], for closures that can fail. An
    /// `Err` is raised as a script error at the call site.
    pub fn register_fallible_function<F>(
        &mut self,
        path: &str,
        closure: F,
    ) -> Result<ClosureHandle, BridgeError>
    where
        F: Fn(Vec<Value>) -> Result<Vec<Value>, BridgeError> + 'static,
    {
        let previous = self.closures.borrow().entry(path);
        let handle = self.closures.borrow_mut().register(path, Rc::new(closure));

        let installed = build_trampoline(
            &self.lua,
            Rc::downgrade(&self.closures),
            handle,
            path.to_string(),
            self.max_table_depth,
        )
        .map_err(map_write_error)
        .and_then(|trampoline| {
            self.install(&PathExpression::parse(path), LuaValue::Function(trampoline))
        });

        if let Err(error) = installed {
            // Trampolines handed out earlier keep calling the old closure.
            self.closures.borrow_mut().restore(path, previous);
            debug!(path, error = %error, "host function registration rolled back");
            return Err(error);
        }

        debug!(path, handle = handle.id(), "registered host function");
        Ok(handle)
    }

    /// Calls the script function at `path` with `args` and returns its results.
    pub fn call_function(&self, path: &str, args: Vec<Value>) -> Result<Vec<Value>, BridgeError> {
        let Some(LuaValue::Function(function)) = self.lookup(path) else {
            return Err(BridgeError::new(
                "RUNTIME_NOT_A_FUNCTION",
                format!("'{}' does not resolve to a function", path),
            ));
        };
        debug!(path, argc = args.len(), "calling script function");

        let args = Pusher::new(&self.lua, self.max_table_depth).push_all(&args)?;
        let results = function.call::<MultiValue>(args).map_err(map_call_error)?;

        let mut puller = Puller::new(PullMode::Strict, self.max_table_depth);
        results.into_iter().map(|value| puller.pull(value)).collect()
    }

    /// Names of the closures registered so far, in path order.
    pub fn registered_functions(&self) -> Vec<String> {
        self.closures.borrow().names().map(ToString::to_string).collect()
    }

    /// Tears the interpreter down. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        debug!(chunk = %self.chunk_name, "interpreter closed");
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("chunk_name", &self.chunk_name)
            .field("max_table_depth", &self.max_table_depth)
            .field("closures", &self.closures.borrow())
            .finish_non_exhaustive()
    }
}
