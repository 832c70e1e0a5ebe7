//! Error types for ltoweave-core.

use thiserror::Error;

/// Result type for ltoweave-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A module whose declared LTO properties are contradictory.
///
/// Fatal for that module's build only; the rest of the graph is still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module '{module}': {message}")]
pub struct ConfigError {
    /// Name of the offending module.
    pub module: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl ConfigError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur in ltoweave-core.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more modules carry an invalid LTO configuration.
    #[error("invalid LTO configuration: {}", join_errors(.0))]
    Configuration(Vec<ConfigError>),

    /// Module not found in the graph.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// A module name uses the reserved variant separator.
    #[error("invalid module name: {0}")]
    InvalidModuleName(String),

    /// A module with the same name is already registered.
    #[error("duplicate module: {0}")]
    DuplicateModule(String),

    /// Invalid graph operation (e.g., cloning a clone).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Failed to parse a graph manifest.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Configuration(vec![err])
    }
}

impl Error {
    /// Short recovery hint for the error, if there is one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Configuration(_) => Some(
                "`lto.full` and `lto.thin` are mutually exclusive; keep at most one of them",
            ),
            Error::ModuleNotFound(_) => Some("check the `deps` entries of the manifest for typos"),
            Error::DuplicateModule(_) => Some("module names must be unique within a manifest"),
            Error::InvalidModuleName(_) => Some("`#` is reserved for generated LTO variant names"),
            Error::Manifest(_) => Some("the manifest must be a JSON object with a `modules` list"),
            Error::InvalidOperation(_) | Error::Io(_) => None,
        }
    }

    /// Render the error together with its recovery hint.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = Error::Configuration(vec![
            ConfigError::new("liba", "full and thin LTO are mutually exclusive"),
            ConfigError::new("libb", "full and thin LTO are mutually exclusive"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("module 'liba'"));
        assert!(msg.contains("module 'libb'"));
    }

    #[test]
    fn test_hint_for_configuration() {
        let err: Error = ConfigError::new("app", "bad").into();
        assert!(err.with_hint().contains("hint:"));
        assert!(Error::InvalidOperation("x".into()).with_hint().ends_with('x'));
    }
}
