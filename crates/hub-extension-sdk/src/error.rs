//! Extension error types.

/// Errors raised while interpreting an extension declaration.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The declaration's properties do not match what its kind expects.
    #[error("Malformed '{type_tag}' declaration: {reason}")]
    Malformed { type_tag: String, reason: String },

    /// A required code reference is missing from the declaration.
    #[error("Declaration '{type_tag}' is missing code reference '{name}'")]
    MissingCodeRef { type_tag: String, name: String },

    /// An encoded code reference could not be parsed.
    #[error("Invalid code reference '{0}'")]
    InvalidCodeRef(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading a code reference.
///
/// `LoadError` is `Clone` so a single failed resolution can be handed to
/// every consumer waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Export '{export}' not found in module '{module}'")]
    ExportNotFound { module: String, export: String },

    #[error("Resolved value is not a {expected}")]
    TypeMismatch { expected: &'static str },

    #[error("Load failed: {0}")]
    Failed(String),
}

impl LoadError {
    /// Convenience constructor for loader implementations.
    pub fn failed(msg: impl Into<String>) -> Self {
        LoadError::Failed(msg.into())
    }
}

/// Result type for declaration handling.
pub type Result<T> = std::result::Result<T, ExtensionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtensionError::Malformed {
            type_tag: "app.tab".to_string(),
            reason: "missing field `id`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed 'app.tab' declaration: missing field `id`"
        );

        let err = LoadError::ExportNotFound {
            module: "icons".to_string(),
            export: "HomeIcon".to_string(),
        };
        assert_eq!(err.to_string(), "Export 'HomeIcon' not found in module 'icons'");
    }
}
