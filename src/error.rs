//! Error type shared by the whole crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading data, building the network or running it.
#[derive(Debug, Error)]
pub enum AlexNetError {
    /// A file or directory could not be read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image could not be decoded or encoded.
    #[error("image error on {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A flat buffer does not hold the number of values its shape requires.
    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A tensor has the wrong number of dimensions.
    #[error("expected a rank-{expected} tensor, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// A tensor has the right rank but the wrong dimensions.
    #[error("invalid tensor shape: expected {expected:?}, got {actual:?}")]
    InvalidShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The image tree contained no usable images.
    #[error("no images found under {}", .0.display())]
    EmptyDataset(PathBuf),

    /// A class directory has no counterpart among the reference class names.
    #[error("class {name:?} is not one of the training classes")]
    UnknownClass { name: String },

    /// Two datasets label their examples with different class lists.
    #[error("class lists differ: expected {expected:?}, got {actual:?}")]
    ClassMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("label {label} out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },

    /// The number of optimizers handed to a model does not match its parameter tensors.
    #[error("expected {expected} optimizers (one per parameter tensor), got {actual}")]
    ParameterCount { expected: usize, actual: usize },
}

impl AlexNetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AlexNetError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AlexNetError>;
