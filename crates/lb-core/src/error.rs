use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BridgeError {
    pub code: String,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Wraps any displayable failure under `code`, keeping its text as the message.
    pub fn wrap(code: &'static str, error: impl Display) -> Self {
        Self::new(code, error.to_string())
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}
