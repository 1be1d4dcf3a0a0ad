//! Public surface of the bridge: the interpreter, the host value model, and
//! helpers for moving table snapshots between interpreters or onto disk.

mod error_map;
mod snapshot_store;

pub use lb_core::{literal, BridgeError, Key, PathExpression, Table, Value};
pub use lb_runtime::{
    ClosureHandle, HostFunction, Interpreter, InterpreterOptions, StdLib, DEFAULT_CHUNK_NAME,
    DEFAULT_MAX_TABLE_DEPTH,
};
pub use snapshot_store::{
    load_table_snapshot, save_table_snapshot, TableSnapshotFile, TABLE_SNAPSHOT_SCHEMA,
};

use tracing::debug;

/// Copies the value at `path` in `from` to the same path in `to`.
///
/// Returns `false` and leaves `to` untouched when nothing with a host
/// counterpart lives at `path` in `from`.
pub fn transfer_value(
    from: &Interpreter,
    to: &mut Interpreter,
    path: &str,
) -> Result<bool, BridgeError> {
    let value = match from.try_read_table(path)? {
        Some(table) => Some(Value::from(table)),
        None => from.read_value(path),
    };
    let Some(value) = value else {
        debug!(path, "nothing to transfer");
        return Ok(false);
    };

    debug!(path, kind = value.type_name(), "transferring value");
    to.write_value(path, value)?;
    Ok(true)
}

#[cfg(test)]
mod tests;
