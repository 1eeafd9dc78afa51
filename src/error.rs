use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::CacheError;

/// Errors raised while indexing or reading datasets.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The file could not be opened or its contents could not be parsed.
    #[error("cannot read \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A required identifying attribute is absent.
    #[error("missing attribute \"{0}\"")]
    MissingAttribute(String),

    /// The `period` attribute is not of the form `<start>-<end>`.
    #[error("malformed period \"{0}\" (expected <start>-<end>)")]
    MalformedPeriod(String),

    #[error("cannot merge series: {0}")]
    Merge(String),

    /// An executor task ended without producing a result.
    #[error("extraction task did not complete")]
    TaskFailed,

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub(crate) fn read(path: &Path, err: anyhow::Error) -> Self {
        // Flatten the context chain so the message names the root cause.
        CatalogError::Read {
            path: path.to_path_buf(),
            source: format!("{err:#}").into(),
        }
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Per-file warnings
// ---------------------------------------------------------------------------

/// A file that was skipped, and why.
#[derive(Debug)]
pub struct FileWarning {
    pub file: PathBuf,
    pub error: CatalogError,
}

impl fmt::Display for FileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped \"{}\": {}", self.file.display(), self.error)
    }
}

impl FileWarning {
    /// Log the warning and return it, so call sites can collect it.
    pub(crate) fn emit(file: &Path, error: CatalogError) -> Self {
        let warning = FileWarning {
            file: file.to_path_buf(),
            error,
        };
        log::warn!("{warning}");
        warning
    }
}

/// A best-effort result together with the files that had to be skipped.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<FileWarning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, warnings: Vec<FileWarning>) -> Self {
        Outcome { value, warnings }
    }

    /// Whether every file was processed without a warning.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}
