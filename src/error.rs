//! Error types shared by every stage of an evaluation run.

use thiserror::Error;

/// Errors raised while building inputs or folding scenes.
#[derive(Error, Debug)]
pub enum Error {
    /// Ground-truth and predicted label maps of a scene do not cover the same pixels.
    #[error("{scene_id}: number of predicted values {predicted:?} does not match ground truth {ground_truth:?}")]
    ShapeMismatch {
        scene_id: String,
        ground_truth: Vec<usize>,
        predicted: Vec<usize>,
    },

    /// Two flat label buffers of different lengths.
    #[error("number of predicted values {predicted} does not match ground truth {ground_truth}")]
    LengthMismatch { ground_truth: usize, predicted: usize },

    /// A label buffer whose length disagrees with its declared shape.
    #[error("label buffer of length {len} does not fit shape {shape:?}")]
    InvalidShape { shape: Vec<usize>, len: usize },

    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    /// Two confusion matrices of different sizes were combined.
    #[error("confusion matrix size mismatch: expected {expected}, found {found}")]
    MatrixSizeMismatch { expected: usize, found: usize },

    /// A scene file row that cannot be turned into a scene record.
    #[error("invalid scene record: {0}")]
    InvalidRecord(String),

    /// A report line that does not parse back into its numeric fields.
    #[error("malformed report line: {0:?}")]
    InvalidReportLine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

pub type Result<T> = std::result::Result<T, Error>;
