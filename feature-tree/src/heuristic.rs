//! Stopping parameters for tree construction.

use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::errors::{IndexError, IndexResult};

/// Deepest tree the builder will produce and the codec will accept.
pub const MAX_TREE_DEPTH: u32 = 256;

/// Decides when the builder stops splitting a node.
///
/// A node keeps splitting while all of these hold:
/// - its depth is below `max_depth`
/// - it holds more than `min_entry_count` entries
/// - it holds more than `target_entry_count` entries, or its bounds have
///   an error metric above `min_error_metric`
///
/// # Examples
///
/// ```rust
/// use feature_tree::Heuristic;
///
/// let heuristic = Heuristic::default()
///     .max_depth(16)
///     .target_entry_count(32);
/// assert!(heuristic.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristic {
    pub max_depth: u32,
    pub min_entry_count: usize,
    pub target_entry_count: usize,
    pub min_error_metric: f64,
    /// Retry a degenerate split once on the short axis before giving up.
    pub retry_secondary_axis: bool,
}

impl Default for Heuristic {
    fn default() -> Self {
        Self {
            max_depth: 32,
            min_entry_count: 1,
            target_entry_count: 8,
            min_error_metric: 4.0,
            retry_secondary_axis: false,
        }
    }
}

impl Heuristic {
    pub fn new(
        max_depth: u32,
        min_entry_count: usize,
        target_entry_count: usize,
        min_error_metric: f64,
    ) -> Self {
        Self {
            max_depth,
            min_entry_count,
            target_entry_count,
            min_error_metric,
            retry_secondary_axis: false,
        }
    }

    #[inline]
    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[inline]
    pub fn min_entry_count(mut self, min_entry_count: usize) -> Self {
        self.min_entry_count = min_entry_count;
        self
    }

    #[inline]
    pub fn target_entry_count(mut self, target_entry_count: usize) -> Self {
        self.target_entry_count = target_entry_count;
        self
    }

    #[inline]
    pub fn min_error_metric(mut self, min_error_metric: f64) -> Self {
        self.min_error_metric = min_error_metric;
        self
    }

    #[inline]
    pub fn retry_secondary_axis(mut self, retry: bool) -> Self {
        self.retry_secondary_axis = retry;
        self
    }

    /// Rejects a NaN `min_error_metric`, the one value no comparison in
    /// [`Heuristic::should_split`] can order.
    ///
    /// Any other combination builds a tree: a target below the minimum
    /// count or a negative metric only makes splitting more eager, and a
    /// `max_depth` above [`MAX_TREE_DEPTH`] is capped there.
    pub fn validate(&self) -> IndexResult<()> {
        if self.min_error_metric.is_nan() {
            return Err(IndexError::InvalidHeuristic(
                "min_error_metric must be a number, got NaN".to_string(),
            ));
        }
        Ok(())
    }

    /// `max_depth` capped at [`MAX_TREE_DEPTH`].
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.min(MAX_TREE_DEPTH)
    }

    /// Whether a node at `depth` holding `entry_count` entries inside
    /// `bounds` should be split further.
    pub fn should_split(&self, depth: u32, entry_count: usize, bounds: &BoundingBox) -> bool {
        depth < self.effective_max_depth()
            && entry_count > self.min_entry_count
            && (entry_count > self.target_entry_count
                || bounds.error_metric() > self.min_error_metric)
    }
}
