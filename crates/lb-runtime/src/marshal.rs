use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use lb_core::{BridgeError, Key, Table, Value};
use mlua::{Lua, MultiValue, Table as LuaTable, Value as LuaValue};
use tracing::trace;

use crate::error_map::{map_pull_error, map_push_error};

/// How a table snapshot treats entries it cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PullMode {
    /// Skip them. Used for host reads of script state.
    Lenient,
    /// Fail. Used at the call boundary, where nothing may be dropped silently.
    Strict,
}

/// Integer keys beyond this magnitude could land on the same `f64` as a
/// neighbour, so they are not snapshotted.
const MAX_EXACT_INTEGER_KEY: u64 = 1 << 53;

/// The string's contents when they are valid UTF-8. Other byte strings have no
/// host counterpart; converting them lossily could merge distinct keys.
pub(crate) fn utf8_text(text: &mlua::String) -> Option<String> {
    std::str::from_utf8(&text.as_bytes()).ok().map(str::to_owned)
}

fn not_utf8(code: &str) -> BridgeError {
    BridgeError::new(code, "byte string is not valid UTF-8")
}

fn too_deep(max_depth: usize) -> BridgeError {
    BridgeError::new(
        "MARSHAL_TABLE_TOO_DEEP",
        format!("table nesting exceeds the limit of {} levels", max_depth),
    )
}

/// Converts host values into runtime values.
///
/// One pusher builds one runtime table per host table node, so a node shared
/// by several parents stays shared on the runtime side.
pub(crate) struct Pusher<'lua> {
    lua: &'lua Lua,
    max_depth: usize,
    created: HashMap<*const Table, LuaTable>,
}

impl<'lua> Pusher<'lua> {
    pub(crate) fn new(lua: &'lua Lua, max_depth: usize) -> Self {
        Self {
            lua,
            max_depth,
            created: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, value: &Value) -> Result<LuaValue, BridgeError> {
        self.push_at(value, 0)
    }

    fn push_at(&mut self, value: &Value, depth: usize) -> Result<LuaValue, BridgeError> {
        match value {
            Value::Nil => Ok(LuaValue::Nil),
            Value::Boolean(flag) => Ok(LuaValue::Boolean(*flag)),
            Value::Number(number) => Ok(LuaValue::Number(*number)),
            Value::Text(text) => self
                .lua
                .create_string(text)
                .map(LuaValue::String)
                .map_err(map_push_error),
            Value::Table(table) => self.push_table(table, depth).map(LuaValue::Table),
        }
    }

    fn push_key(&mut self, key: &Key) -> Result<LuaValue, BridgeError> {
        match key {
            Key::Number(number) => Ok(LuaValue::Number(*number)),
            Key::Boolean(flag) => Ok(LuaValue::Boolean(*flag)),
            Key::String(name) => self
                .lua
                .create_string(name)
                .map(LuaValue::String)
                .map_err(map_push_error),
        }
    }

    fn push_table(&mut self, table: &Rc<Table>, depth: usize) -> Result<LuaTable, BridgeError> {
        let node = Rc::as_ptr(table);
        if let Some(existing) = self.created.get(&node) {
            return Ok(existing.clone());
        }
        if depth >= self.max_depth {
            return Err(too_deep(self.max_depth));
        }

        let target = self.lua.create_table().map_err(map_push_error)?;
        for (key, value) in table.iter() {
            let key = self.push_key(key)?;
            let value = self.push_at(value, depth + 1)?;
            target.set(key, value).map_err(map_push_error)?;
        }

        self.created.insert(node, target.clone());
        Ok(target)
    }

    /// Pushes a sequence, e.g. a closure's results, sharing nodes across it.
    pub(crate) fn push_all(&mut self, values: &[Value]) -> Result<MultiValue, BridgeError> {
        values.iter().map(|value| self.push(value)).collect()
    }
}

/// Converts runtime values into host values, snapshotting tables.
///
/// Each runtime table is snapshotted once per puller; reaching it again returns
/// the same `Rc` node. A table reached again while it is still being read is a
/// cycle and fails.
pub(crate) struct Puller {
    mode: PullMode,
    max_depth: usize,
    in_progress: HashSet<usize>,
    finished: HashMap<usize, Rc<Table>>,
}

impl Puller {
    pub(crate) fn new(mode: PullMode, max_depth: usize) -> Self {
        Self {
            mode,
            max_depth,
            in_progress: HashSet::new(),
            finished: HashMap::new(),
        }
    }

    /// Converts one value by its runtime tag. Functions, userdata, threads and
    /// the like have no host counterpart and are rejected.
    pub(crate) fn pull(&mut self, value: LuaValue) -> Result<Value, BridgeError> {
        self.pull_at(value, 0)
    }

    fn pull_at(&mut self, value: LuaValue, depth: usize) -> Result<Value, BridgeError> {
        match value {
            LuaValue::Nil => Ok(Value::Nil),
            LuaValue::Boolean(flag) => Ok(Value::Boolean(flag)),
            LuaValue::Integer(integer) => Ok(Value::Number(integer as f64)),
            LuaValue::Number(number) => Ok(Value::Number(number)),
            LuaValue::String(text) => utf8_text(&text)
                .map(Value::Text)
                .ok_or_else(|| not_utf8("MARSHAL_UNSUPPORTED_TYPE")),
            LuaValue::Table(table) => self.pull_table(&table, depth).map(Value::Table),
            other => Err(BridgeError::new(
                "MARSHAL_UNSUPPORTED_TYPE",
                format!("unsupported value type '{}'", other.type_name()),
            )),
        }
    }

    fn pull_key(&self, key: LuaValue) -> Result<Key, BridgeError> {
        match key {
            LuaValue::Boolean(flag) => Ok(Key::Boolean(flag)),
            LuaValue::Integer(integer) if integer.unsigned_abs() <= MAX_EXACT_INTEGER_KEY => {
                Ok(Key::Number(integer as f64))
            }
            LuaValue::Integer(integer) => Err(BridgeError::new(
                "MARSHAL_UNSUPPORTED_KEY",
                format!("integer key {} is not exactly representable as a number", integer),
            )),
            LuaValue::Number(number) => Ok(Key::Number(number)),
            LuaValue::String(name) => utf8_text(&name)
                .map(Key::String)
                .ok_or_else(|| not_utf8("MARSHAL_UNSUPPORTED_KEY")),
            other => Err(BridgeError::new(
                "MARSHAL_UNSUPPORTED_KEY",
                format!("unsupported key type '{}'", other.type_name()),
            )),
        }
    }

    pub(crate) fn pull_table(
        &mut self,
        table: &LuaTable,
        depth: usize,
    ) -> Result<Rc<Table>, BridgeError> {
        let node = table.to_pointer() as usize;
        if let Some(done) = self.finished.get(&node) {
            return Ok(Rc::clone(done));
        }
        if depth >= self.max_depth {
            return Err(too_deep(self.max_depth));
        }
        if !self.in_progress.insert(node) {
            return Err(BridgeError::new(
                "MARSHAL_TABLE_CYCLE",
                "table contains itself and cannot be snapshotted",
            ));
        }

        let mut snapshot = Table::new();
        for pair in table.pairs::<LuaValue, LuaValue>() {
            let (key, value) = pair.map_err(map_pull_error)?;
            let entry = self
                .pull_key(key)
                .and_then(|key| Ok((key, self.pull_at(value, depth + 1)?)));
            match entry {
                Ok((key, value)) => {
                    snapshot.insert(key, value);
                }
                Err(error) if self.skips(&error) => {
                    trace!(reason = %error, "skipping table entry");
                }
                Err(error) => return Err(error),
            }
        }

        self.in_progress.remove(&node);
        let snapshot = Rc::new(snapshot);
        self.finished.insert(node, Rc::clone(&snapshot));
        Ok(snapshot)
    }

    fn skips(&self, error: &BridgeError) -> bool {
        self.mode == PullMode::Lenient
            && (error.is("MARSHAL_UNSUPPORTED_TYPE") || error.is("MARSHAL_UNSUPPORTED_KEY"))
    }
}

/// Reads a call's positional arguments in order. The first argument without a
/// host counterpart aborts the whole call; nil counts as one.
pub(crate) fn pull_arguments(
    args: MultiValue,
    callee: &str,
    max_depth: usize,
) -> Result<Vec<Value>, BridgeError> {
    let mut puller = Puller::new(PullMode::Strict, max_depth);
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            let pulled = match arg {
                LuaValue::Nil => Err(BridgeError::new(
                    "MARSHAL_UNSUPPORTED_TYPE",
                    "unsupported value type 'nil'",
                )),
                arg => puller.pull(arg),
            };
            pulled.map_err(|error| {
                BridgeError::new(
                    error.code,
                    format!("argument #{} to '{}': {}", index + 1, callee, error.message),
                )
            })
        })
        .collect()
}
