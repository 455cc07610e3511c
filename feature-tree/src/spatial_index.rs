//! The public handle over a built tree.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::bounding_box::BoundingBox;
use crate::codec::{read_tree, write_tree};
use crate::entry::{FeatureId, IndexEntry};
use crate::errors::{IndexError, IndexResult};
use crate::heuristic::Heuristic;
use crate::tree_node::{SearchIter, SearchMode, TreeNode, TreeStats};

/// An immutable, bulk-built index over feature bounding boxes.
///
/// Built once from the full feature set and replaced wholesale when the
/// data changes. Searching needs only `&self`, so a `SpatialIndex` can be
/// shared across threads behind an `Arc` without further locking.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialIndex {
    root: TreeNode,
}

/// Builds an index over `entries`.
///
/// Returns `Ok(None)` when there is nothing to index.
pub fn build_index<I>(entries: I, heuristic: &Heuristic) -> IndexResult<Option<SpatialIndex>>
where
    I: IntoIterator<Item = IndexEntry>,
{
    SpatialIndex::build(entries, heuristic)
}

/// Reads an index previously written with [`SpatialIndex::save`].
pub fn load_index<R: Read + ?Sized>(input: &mut R) -> IndexResult<SpatialIndex> {
    Ok(SpatialIndex {
        root: read_tree(input)?,
    })
}

/// Reads an index from a file written with [`SpatialIndex::save_to_path`].
pub fn load_index_from_path(path: impl AsRef<Path>) -> IndexResult<SpatialIndex> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let index = load_index(&mut reader)?;
    log::debug!(
        "Loaded spatial index with {} entries from {:?}",
        index.len(),
        path
    );
    Ok(index)
}

impl SpatialIndex {
    /// See [`build_index`].
    pub fn build<I>(entries: I, heuristic: &Heuristic) -> IndexResult<Option<Self>>
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        let entries: Vec<IndexEntry> = entries.into_iter().collect();
        if entries.is_empty() {
            log::debug!("No features to index, skipping tree build");
            return Ok(None);
        }

        log::debug!("Building spatial index over {} entries", entries.len());
        let root = TreeNode::build(entries, heuristic)?;
        let stats = root.stats();
        log::debug!(
            "Built spatial index: {} nodes, {} leaves, depth {}, largest leaf {}",
            stats.node_count,
            stats.leaf_count,
            stats.depth,
            stats.max_leaf_size
        );
        Ok(Some(Self { root }))
    }

    /// Wraps an existing tree, rejecting it if its structure is broken.
    pub fn from_root(root: TreeNode) -> IndexResult<Self> {
        let report = root.check_integrity();
        if !report.is_valid {
            let first = report.errors.into_iter().next().unwrap_or_default();
            return Err(IndexError::CorruptIndex(first));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn into_root(self) -> TreeNode {
        self.root
    }

    /// Extent of every indexed feature.
    pub fn bounds(&self) -> &BoundingBox {
        self.root.bounds()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn stats(&self) -> TreeStats {
        self.root.stats()
    }

    /// Ids of features whose boxes intersect `query`.
    pub fn search(&self, query: &BoundingBox) -> Vec<FeatureId> {
        self.root.search(query)
    }

    /// Ids of every feature in each leaf whose bounds intersect `query`.
    ///
    /// A superset of [`SpatialIndex::search`]; skips the per-entry test.
    pub fn search_candidates(&self, query: &BoundingBox) -> Vec<FeatureId> {
        let mut results = Vec::new();
        self.root
            .search_into(query, SearchMode::Candidates, &mut results);
        results
    }

    /// Lazily yields the same ids, in the same order, as [`SpatialIndex::search`].
    pub fn search_iter(&self, query: BoundingBox) -> SearchIter<'_> {
        self.root.search_iter(query)
    }

    /// Writes the index to `out`. The stream is not flushed.
    pub fn save<W: Write + ?Sized>(&self, out: &mut W) -> IndexResult<()> {
        write_tree(&self.root, out)
    }

    /// Writes the index to a file, replacing any existing one.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> IndexResult<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        log::debug!("Saved spatial index with {} entries to {:?}", self.len(), path);
        Ok(())
    }
}
