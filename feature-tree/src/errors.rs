//! Error and result types shared by the builder, the codec and the provider.

use std::io;
use thiserror::Error;

use crate::entry::FeatureId;

/// Errors that can occur while building, loading or saving a feature tree.
///
/// Construction and search are total for valid input; everything fallible
/// is either the box validation at the builder's entry or the codec.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A box handed to the builder is NaN, infinite or inverted.
    #[error("Invalid bounds for feature {id}: {reason}")]
    InvalidBounds { id: FeatureId, reason: &'static str },

    /// The builder was called with no entries.
    #[error("Cannot build a tree node from an empty entry list")]
    EmptyInput,

    #[error("Invalid heuristic: {0}")]
    InvalidHeuristic(String),

    /// The stream starts with a version tag this reader does not understand.
    #[error("Unsupported index format version {found} (expected {expected})")]
    UnsupportedFormatVersion { found: f64, expected: f64 },

    /// The stream is truncated or structurally malformed.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IndexError {
    /// Returns `true` when rebuilding from source data is the sensible
    /// recovery, i.e. the persisted index cannot be used.
    pub fn is_stale_index(&self) -> bool {
        matches!(
            self,
            IndexError::UnsupportedFormatVersion { .. } | IndexError::CorruptIndex(_)
        )
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
