//! Host side of the Lua bridge: dotted-path reads and writes into an embedded
//! Lua state, table snapshots, and host closures callable from scripts.

mod closures;
mod error_map;
mod interpreter;
mod marshal;
mod navigator;

pub use closures::{ClosureHandle, ClosureRegistry, HostFunction};
pub use interpreter::{
    Interpreter, InterpreterOptions, DEFAULT_CHUNK_NAME, DEFAULT_MAX_TABLE_DEPTH,
};
pub use lb_core::{BridgeError, Key, PathExpression, Table, Value};
pub use mlua::StdLib;
