use std::path::PathBuf;

use thiserror::Error;

/// Error surfaced to the `dg` binary: a message plus the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised by the feature pipeline.
///
/// Every stage fails fast with one of these instead of dropping rows.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Referential integrity between two input tables is broken.
    #[error("{table} line {line}: {column}={value} is not present in {reference}")]
    MissingKey {
        table: &'static str,
        line: usize,
        column: &'static str,
        value: i64,
        reference: &'static str,
    },

    /// An expected column is absent, a value is mistyped or out of range.
    #[error("schema error in {table}: {message}")]
    Schema { table: &'static str, message: String },

    /// The run configuration is inconsistent with itself or with the data.
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stage produced output that breaks one of its own guarantees.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl PipelineError {
    pub fn schema(table: &'static str, message: impl Into<String>) -> Self {
        Self::Schema {
            table,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code used by the binary for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Schema { .. } | Self::Io { .. } => 2,
            Self::MissingKey { .. } => 3,
            Self::Invariant(_) => 4,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}
