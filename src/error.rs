//! Error types shared by every stage of the conversion pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed annotation store {path}: {msg}")]
    MalformedStore { path: PathBuf, msg: String },
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
    #[error("source group {group} holds {available} samples but {requested} were requested")]
    InsufficientSamples {
        group: usize,
        available: usize,
        requested: usize,
    },
    #[error("image {name} not found under the source root")]
    MissingSourceFile { name: String },
    #[error("label file {label} missing for image {image}")]
    MissingLabel { image: PathBuf, label: PathBuf },
    #[error("invalid category map: {0}")]
    InvalidCategoryMap(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl DatasetError {
    /// Build a closure that attaches `path` to an I/O error, for use with `map_err`.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError + '_ {
        move |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> DatasetError + '_ {
        move |source| DatasetError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}
