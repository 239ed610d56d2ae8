//! Error type shared by GRM computation and GRM file I/O.

use std::path::{Path, PathBuf};

use grm_linalg::LinalgError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrmError {
    #[error("Empty dataset: {n_samples} samples, {n_variants} usable variants")]
    EmptyDataset { n_samples: usize, n_variants: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Format error in {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error(transparent)]
    Reader(#[from] anyhow::Error),
}

impl GrmError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        GrmError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn format(path: &Path, message: impl Into<String>) -> Self {
        GrmError::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn from_linalg(path: &Path, err: LinalgError) -> Self {
        GrmError::format(path, err.to_string())
    }
}
