use lb_core::BridgeError;

pub(crate) fn map_script_error(error: mlua::Error) -> BridgeError {
    match error {
        mlua::Error::SyntaxError { message, .. } => {
            BridgeError::new("RUNTIME_SYNTAX_ERROR", message)
        }
        other => BridgeError::wrap("RUNTIME_SCRIPT_ERROR", other),
    }
}

pub(crate) fn map_call_error(error: mlua::Error) -> BridgeError {
    BridgeError::wrap("RUNTIME_CALL_ERROR", error)
}

pub(crate) fn map_write_error(error: mlua::Error) -> BridgeError {
    BridgeError::wrap("RUNTIME_WRITE_FAILED", error)
}

pub(crate) fn map_push_error(error: mlua::Error) -> BridgeError {
    BridgeError::wrap("MARSHAL_PUSH_FAILED", error)
}

pub(crate) fn map_pull_error(error: mlua::Error) -> BridgeError {
    BridgeError::wrap("MARSHAL_PULL_FAILED", error)
}

pub(crate) fn map_init_error(error: mlua::Error) -> BridgeError {
    BridgeError::wrap("RUNTIME_INIT_FAILED", error)
}

/// Turns a host-side failure into an error raised inside the running script.
pub(crate) fn into_lua_error(error: BridgeError) -> mlua::Error {
    mlua::Error::RuntimeError(error.to_string())
}
