use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Everything that can go wrong while opening, reading or assembling a
/// dataset. Each variant carries the path that triggered it; failures
/// surface immediately to the caller and nothing is retried.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{}: {source}", path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("summary table {} has no '{column}' column", path.display())]
    MissingColumn {
        path: PathBuf,
        column: &'static str,
    },

    #[error("{}, row {row}: {message}", path.display())]
    MalformedRow {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

impl DatasetError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive(path: &Path, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn table(path: &Path, source: csv::Error) -> Self {
        Self::Table {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn image(path: &Path, source: image::ImageError) -> Self {
        Self::Image {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, row: usize, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            path: path.to_path_buf(),
            row,
            message: message.into(),
        }
    }
}
