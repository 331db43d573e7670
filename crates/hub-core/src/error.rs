//! Host error types.

use hub_extension_sdk::{ExtensionError, LoadError};

/// Errors raised by the extension host.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Extension store is sealed, cannot register plugin '{0}'")]
    StoreSealed(String),

    #[error("Plugin '{plugin}' declaration #{index} rejected: {source}")]
    InvalidDeclaration {
        plugin: String,
        index: usize,
        source: ExtensionError,
    },

    #[error("Plugin '{plugin}' requires host {required}, running {actual}")]
    IncompatibleHost {
        plugin: String,
        required: String,
        actual: String,
    },

    #[error("Manifest error in {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HubError>;
