use lb_core::BridgeError;

pub(crate) fn map_snapshot_io(error: std::io::Error) -> BridgeError {
    BridgeError::wrap("SNAPSHOT_IO", error)
}

pub(crate) fn map_snapshot_invalid(error: serde_json::Error) -> BridgeError {
    BridgeError::wrap("SNAPSHOT_INVALID", error)
}
