//! Error types for auditar.

use std::path::PathBuf;

/// Result type alias for auditar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in auditar operations.
///
/// Data problems (missing values, duplicates, outlier concentrations) are
/// findings, not errors: they travel through the score and issue channel.
/// This enum covers stream-level failures, state conflicts and
/// configuration mistakes only.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error while reading a source file.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// The path where the error occurred, if known.
        path: Option<PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Arrow error while building or reading record batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error during file operations.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The source file has an extension no chunk source understands.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// The unsupported format name or extension.
        format: String,
    },

    /// The source file could not be parsed as its claimed format.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// An audit was requested while one is already running for the dataset.
    ///
    /// The in-flight audit continues unaffected; the new request is
    /// rejected immediately.
    #[error("Audit already running for dataset '{dataset_id}'")]
    AuditInProgress {
        /// Identity of the dataset with an in-flight audit.
        dataset_id: String,
    },

    /// No dataset with the given identity is known to the dataset store.
    #[error("Dataset '{dataset_id}' not found")]
    DatasetNotFound {
        /// The requested dataset identity.
        dataset_id: String,
    },

    /// Backing store error.
    #[error("Store error: {message}")]
    Store {
        /// Description of the store error.
        message: String,
    },
}

impl Error {
    /// Create an I/O error with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Create an I/O error without path context.
    pub fn io_no_path(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an audit-in-progress error.
    pub fn audit_in_progress(dataset_id: impl Into<String>) -> Self {
        Self::AuditInProgress {
            dataset_id: dataset_id.into(),
        }
    }

    /// Create a dataset-not-found error.
    pub fn dataset_not_found(dataset_id: impl Into<String>) -> Self {
        Self::DatasetNotFound {
            dataset_id: dataset_id.into(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
