//! Bridge error types
//!
//! Every fallible operation in the crate returns [`BridgeResult`].

use thiserror::Error;

/// Errors produced while driving a formatting plugin
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to compile plugin module: {0}")]
    Compilation(String),

    #[error("Failed to instantiate plugin module: {0}")]
    Instantiation(String),

    #[error("Plugin does not export `{name}`")]
    MissingExport { name: String },

    #[error("Plugin export `{name}` has an unexpected signature, expected {expected}")]
    SignatureMismatch { name: String, expected: String },

    #[error("Guest memory access out of bounds: offset={offset}, size={size}")]
    MemoryOutOfBounds { offset: u32, size: u32 },

    #[error("Guest reported an unusable staging buffer: offset={offset}, capacity={capacity}")]
    InvalidBuffer { offset: i32, capacity: i32 },

    #[error("Call to `{export}` failed: {message}")]
    Execution { export: String, message: String },

    /// The plugin trapped while formatting one input; the instance stays usable.
    #[error("Plugin trapped in `{export}`: {message}")]
    Trap { export: String, message: String },

    #[error("Failed to serialize {scope} configuration: {message}")]
    Serialization { scope: String, message: String },

    /// The plugin rejected the input; the message is the plugin's own text.
    #[error("{0}")]
    Format(String),

    #[error("Plugin returned unexpected status code {0}")]
    UnexpectedStatus(i32),

    #[error("Plugin produced invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Formatter instance already initialized")]
    AlreadyInitialized,

    #[error("Formatter instance not initialized")]
    NotInitialized,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether this error means the loaded plugin does not speak the protocol
    /// this host expects.
    ///
    /// These are never transient: retrying the same request against the same
    /// instance fails the same way.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::MissingExport { .. }
                | BridgeError::SignatureMismatch { .. }
                | BridgeError::MemoryOutOfBounds { .. }
                | BridgeError::InvalidBuffer { .. }
                | BridgeError::Execution { .. }
        )
    }

    /// Whether the plugin itself rejected the input text.
    pub fn is_format_failure(&self) -> bool {
        matches!(self, BridgeError::Format(_))
    }
}

/// Bridge result type
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_classification() {
        let missing = BridgeError::MissingExport {
            name: "format".to_string(),
        };
        assert!(missing.is_contract_violation());
        assert!(!missing.is_format_failure());

        let oob = BridgeError::MemoryOutOfBounds {
            offset: 70000,
            size: 16,
        };
        assert!(oob.is_contract_violation());

        let rejected = BridgeError::Format("Expected ';'".to_string());
        assert!(!rejected.is_contract_violation());
        assert!(rejected.is_format_failure());

        assert!(!BridgeError::UnexpectedStatus(9).is_contract_violation());
        assert!(!BridgeError::UnexpectedStatus(9).is_format_failure());

        let trap = BridgeError::Trap {
            export: "format".to_string(),
            message: "wasm trap: wasm `unreachable` instruction executed".to_string(),
        };
        assert!(!trap.is_contract_violation());
        assert!(!trap.is_format_failure());
    }

    #[test]
    fn test_format_failure_displays_plugin_message() {
        let err = BridgeError::Format("Line 1, column 4: Expression expected".to_string());
        assert_eq!(err.to_string(), "Line 1, column 4: Expression expected");
    }
}
