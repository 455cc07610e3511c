//! Ownership of the current index by a data provider.
//!
//! A provider holds at most one index at a time. Rebuilding produces a new
//! index off to the side and swaps it in; readers that already took a
//! snapshot keep searching the old one until they drop it.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bounding_box::BoundingBox;
use crate::entry::{FeatureId, IndexEntry};
use crate::errors::{IndexError, IndexResult};
use crate::heuristic::Heuristic;
use crate::spatial_index::{load_index_from_path, SpatialIndex};

/// Holds the current [`SpatialIndex`] of one feature source.
/// Uses Pimpl pattern for cheap cloning and encapsulation.
#[derive(Clone, Default)]
pub struct IndexProvider {
    inner: Arc<IndexProviderInner>,
}

#[derive(Default)]
struct IndexProviderInner {
    current: RwLock<Option<Arc<SpatialIndex>>>,
    heuristic: Heuristic,
    /// Number of swaps so far
    generation: AtomicU64,
}

impl IndexProvider {
    pub fn new(heuristic: Heuristic) -> Self {
        Self {
            inner: Arc::new(IndexProviderInner {
                current: RwLock::new(None),
                heuristic,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn heuristic(&self) -> &Heuristic {
        &self.inner.heuristic
    }

    /// The index readers should use right now, if any.
    ///
    /// The returned `Arc` stays valid after later swaps.
    pub fn snapshot(&self) -> Option<Arc<SpatialIndex>> {
        self.inner.current.read().clone()
    }

    pub fn has_index(&self) -> bool {
        self.inner.current.read().is_some()
    }

    /// Incremented on every swap, including clears.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Searches the current snapshot. No index means no hits.
    pub fn search(&self, query: &BoundingBox) -> Vec<FeatureId> {
        match self.snapshot() {
            Some(index) => index.search(query),
            None => Vec::new(),
        }
    }

    /// Builds a fresh index over `entries` and swaps it in.
    ///
    /// The build runs without holding the lock. On failure the previous
    /// index stays current.
    pub fn rebuild<I>(&self, entries: I) -> IndexResult<()>
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        let index = SpatialIndex::build(entries, &self.inner.heuristic)?;
        self.replace(index);
        Ok(())
    }

    /// Loads a cached index from `path` and swaps it in.
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> IndexResult<()> {
        let index = load_index_from_path(path)?;
        self.replace(Some(index));
        Ok(())
    }

    /// Loads a cached index, falling back to a rebuild from `entries` when
    /// the file is missing, stale or corrupt. Any other error is returned.
    pub fn load_or_rebuild<I>(&self, path: impl AsRef<Path>, entries: I) -> IndexResult<()>
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        let path = path.as_ref();
        match self.load_from_path(path) {
            Ok(()) => Ok(()),
            Err(IndexError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No cached index at {:?}, building from source", path);
                self.rebuild(entries)
            }
            Err(e) if e.is_stale_index() => {
                log::warn!("Discarding cached index at {:?}: {}", path, e);
                self.rebuild(entries)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the current index to `path`. Returns `false` when there is
    /// no index to write.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> IndexResult<bool> {
        match self.snapshot() {
            Some(index) => {
                index.save_to_path(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Swaps in `index` and returns the one it replaced.
    pub fn replace(&self, index: Option<SpatialIndex>) -> Option<Arc<SpatialIndex>> {
        let next = index.map(Arc::new);
        let previous = std::mem::replace(&mut *self.inner.current.write(), next);
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("Spatial index swapped, generation {}", generation);
        previous
    }

    /// Drops the current index.
    pub fn clear(&self) -> Option<Arc<SpatialIndex>> {
        self.replace(None)
    }
}

impl std::fmt::Debug for IndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexProvider")
            .field("entries", &self.snapshot().map(|index| index.len()))
            .field("generation", &self.generation())
            .finish()
    }
}
