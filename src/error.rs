// error.rs

use std::fmt;

use thiserror::Error;

use crate::region::Dataset;

pub type Result<T> = std::result::Result<T, RiboError>;

#[derive(Error, Debug)]
pub enum RiboError {
    #[error("Invalid query: {0}")]
    Validation(#[from] ValidationError),

    #[error("No valid experiments with {dataset} data")]
    NoValidExperiments { dataset: Dataset },

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Table error: {0}")]
    TableError(String),

    #[error("Invalid ribo file: {0}")]
    InvalidFormat(String),

    #[error("HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

impl RiboError {
    /// True for errors raised while checking a query, before any store read.
    pub fn is_validation(&self) -> bool {
        matches!(self, RiboError::Validation(_))
    }
}

/// Problems with the caller's request, relative to what the file holds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No experiments requested")]
    NoExperiments,

    #[error("Unknown experiment(s): {}", .0.join(", "))]
    UnknownExperiments(Vec<String>),

    #[error("No regions requested")]
    NoRegions,

    #[error("Unknown region(s): {}. Valid regions are UTR5, UTR5J, CDS, UTR3J, UTR3", .0.join(", "))]
    UnknownRegions(Vec<String>),

    #[error("Alias mode requested but the file has no transcript aliases")]
    MissingAliases,

    #[error("Read length range [{lower}, {upper}] is outside [{min}, {max}] or reversed")]
    LengthRange {
        lower: u32,
        upper: u32,
        min: u32,
        max: u32,
    },

    #[error("Cannot normalize: experiment(s) without total_reads: {}", .0.join(", "))]
    MissingTotalReads(Vec<String>),

    #[error("Unknown transcript: {0}")]
    UnknownTranscript(String),

    #[error("Unknown metagene site '{0}', expected 'start' or 'stop'")]
    UnknownSite(String),
}

/// A requested experiment that lacks the dataset being queried. It is
/// dropped from the result, not treated as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityWarning {
    pub experiment: String,
    pub dataset: Dataset,
}

impl fmt::Display for CapabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "experiment '{}' has no {} data and is omitted",
            self.experiment, self.dataset
        )
    }
}
