//! The unit of data the tree indexes.

use crate::bounding_box::BoundingBox;
use crate::errors::{IndexError, IndexResult};

/// Opaque identifier of a map feature. The tree never interprets it.
pub type FeatureId = u32;

/// One feature's bounding box paired with its identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub bbox: BoundingBox,
    pub id: FeatureId,
}

impl IndexEntry {
    pub fn new(bbox: BoundingBox, id: FeatureId) -> Self {
        Self { bbox, id }
    }

    /// Rejects entries whose box cannot take part in partitioning.
    pub fn validate(&self) -> IndexResult<()> {
        self.bbox
            .check()
            .map_err(|reason| IndexError::InvalidBounds { id: self.id, reason })
    }
}

impl From<(BoundingBox, FeatureId)> for IndexEntry {
    fn from((bbox, id): (BoundingBox, FeatureId)) -> Self {
        Self { bbox, id }
    }
}
