use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StrataError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Semantic Versioning Error: {0}")]
    SemVer(#[from] Arc<semver::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Recipe Error: {0}")]
    Recipe(String),

    #[error("Malformed constraint in {file} line {line}: '{text}' ({reason})")]
    MalformedConstraint {
        file: String,
        line: usize,
        text: String,
        reason: String,
    },

    #[error("Conflicting constraints for '{package}': '{first}' vs '{second}'")]
    Conflict {
        package: String,
        first: String,
        second: String,
    },

    #[error("Missing source: {path} does not exist")]
    MissingSource { path: PathBuf },

    #[error("Step {index} ({label}) failed: {cause}")]
    StepFailed {
        index: usize,
        label: String,
        cause: String,
    },

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Dependency Error: {0}")]
    Dependency(String),

    #[error("Version error: {0}")]
    Version(String),

    #[error("Parsing Error in {0}: {1}")]
    Parse(&'static str, String),

    #[error("Failed to execute command: {0}")]
    CommandExec(String),

    #[error("Checkout Error: {0}")]
    Checkout(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Json(Arc::new(err))
    }
}

impl From<semver::Error> for StrataError {
    fn from(err: semver::Error) -> Self {
        StrataError::SemVer(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;
