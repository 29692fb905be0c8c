use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for subset creation, verification, and dataset IO failures.
#[derive(Debug, Error)]
pub enum SubsetError {
    #[error("input dataset '{}' not found or unreadable: {reason}", path.display())]
    InputNotFound { path: PathBuf, reason: String },
    #[error("invalid sampling specification: {0}")]
    InvalidSpecification(String),
    #[error("dataset '{}' not found", path.display())]
    DatasetNotFound { path: PathBuf },
    #[error("dataset '{}' is inconsistent: {details}", path.display())]
    DatasetInconsistent { path: PathBuf, details: String },
    #[error("output '{}' already exists and is not empty", path.display())]
    OutputExists { path: PathBuf },
    #[error("subset verification failed: {}", failures.join("; "))]
    VerificationMismatch { failures: Vec<String> },
    #[error(transparent)]
    Io(#[from] io::Error),
}
