use std::fs;
use std::path::Path;

use lb_core::{BridgeError, Table};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error_map::{map_snapshot_invalid, map_snapshot_io};

pub const TABLE_SNAPSHOT_SCHEMA: &str = "table-snapshot.v1";

/// On-disk form of a table snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshotFile {
    pub schema_version: String,
    pub table: Table,
}

impl TableSnapshotFile {
    pub fn new(table: Table) -> Self {
        Self {
            schema_version: TABLE_SNAPSHOT_SCHEMA.to_string(),
            table,
        }
    }
}

pub fn save_table_snapshot(path: &Path, table: &Table) -> Result<(), BridgeError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(map_snapshot_io)?;

    let payload = serde_json::to_string(&TableSnapshotFile::new(table.clone()))
        .map_err(map_snapshot_invalid)?;
    debug!(path = %path.display(), entries = table.len(), "saving table snapshot");
    fs::write(path, payload).map_err(map_snapshot_io)
}

pub fn load_table_snapshot(path: &Path) -> Result<Table, BridgeError> {
    if !path.exists() {
        return Err(BridgeError::new(
            "SNAPSHOT_IO",
            format!("Snapshot file does not exist: {}", path.display()),
        ));
    }

    let raw = fs::read_to_string(path).map_err(map_snapshot_io)?;
    let file: TableSnapshotFile = serde_json::from_str(&raw).map_err(map_snapshot_invalid)?;

    if file.schema_version != TABLE_SNAPSHOT_SCHEMA {
        return Err(BridgeError::new(
            "SNAPSHOT_SCHEMA",
            format!("Unsupported table snapshot schema: {}", file.schema_version),
        ));
    }

    debug!(path = %path.display(), entries = file.table.len(), "loaded table snapshot");
    Ok(file.table)
}
