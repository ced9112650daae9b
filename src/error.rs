//! Error types for extraction, emission and generation, plus the non-fatal
//! anomalies collected along the way.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors while reading and extracting operation definitions. All of them abort the run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("integration '{integration}' not found: expected directory {path}")]
    IntegrationNotFound { integration: String, path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has {found} operation blocks, expected exactly 1")]
    StructuralViolation { path: PathBuf, found: usize },

    #[error("operation '{name}' is defined twice in {module_path}: {first} and {second}")]
    DuplicateOperation {
        name: String,
        module_path: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl ExtractError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExtractError::IntegrationNotFound { .. } | ExtractError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while writing the generated package.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EmitError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        3
    }
}

/// Run-aborting failure of a generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl GenerateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            GenerateError::Extract(e) => e.exit_code(),
            GenerateError::Emit(e) => e.exit_code(),
        }
    }
}

/// Category of a schema degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// `$ref` target missing from the definitions; rendered as `Any`.
    UnresolvedReference,
    /// A reference closed a cycle; an `Any` placeholder was substituted.
    CycleDetected,
    /// A safety cap dropped sibling nodes.
    Truncated,
}

/// Non-fatal degradation found while resolving a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    /// Dotted path of the node, rooted at the schema's name.
    pub location: String,
    pub kind: AnomalyKind,
    pub message: String,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// A registered type whose declaration was not emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedType {
    pub name: String,
    pub source: PathBuf,
    pub reason: String,
}

impl fmt::Display for SkippedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.source.display(), self.reason)
    }
}
