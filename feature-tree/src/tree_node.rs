//! Tree nodes: bulk construction, search and structural checks.
//!
//! The builder partitions entries by the mean centroid along the longer
//! axis of the node bounds, recursing until the [`Heuristic`] says a node
//! is small or tight enough to stay a leaf. Nodes are immutable once
//! built, so any number of threads may search the same tree.

use crate::bounding_box::{Axis, BoundingBox};
use crate::entry::{FeatureId, IndexEntry};
use crate::errors::{IndexError, IndexResult};
use crate::heuristic::Heuristic;

/// Entry count at which sibling subtrees are built on separate rayon tasks.
pub const PARALLEL_SPLIT_THRESHOLD: usize = 4096;

/// A node of the feature tree.
///
/// `bounds` is always the exact join of everything below the node, and an
/// internal node always owns exactly two children.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Stores entries directly
    Leaf {
        bounds: BoundingBox,
        entries: Vec<IndexEntry>,
    },
    /// Splits its entries between two subtrees
    Internal {
        bounds: BoundingBox,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// How leaf entries are reported by a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Each entry's own box is tested against the query.
    #[default]
    Exact,
    /// Every entry of a leaf whose bounds intersect the query is reported.
    Candidates,
}

/// Shape statistics of a built tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub entry_count: u64,
    pub node_count: u64,
    pub leaf_count: u64,
    /// Depth of the deepest node; a lone leaf has depth 0
    pub depth: u32,
    pub max_leaf_size: u64,
}

/// Result of a structural check over a tree.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Total nodes checked
    pub nodes_checked: u64,
    pub leaf_count: u64,
    pub max_depth: u32,
    /// Summary of findings
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            nodes_checked: 0,
            leaf_count: 0,
            max_depth: 0,
            is_valid: true,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, path: &str, message: String) {
        self.is_valid = false;
        self.errors.push(format!("{}: {}", path, message));
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeNode {
    /// Builds a tree over `entries`, starting at depth 0.
    ///
    /// Every entry is validated before any partitioning happens. An empty
    /// list is rejected; callers with no features have no tree.
    pub fn build(entries: Vec<IndexEntry>, heuristic: &Heuristic) -> IndexResult<TreeNode> {
        Self::build_at_depth(entries, 0, heuristic)
    }

    /// Builds a subtree whose root sits at `depth` below the real root.
    pub fn build_at_depth(
        entries: Vec<IndexEntry>,
        depth: u32,
        heuristic: &Heuristic,
    ) -> IndexResult<TreeNode> {
        heuristic.validate()?;
        if entries.is_empty() {
            return Err(IndexError::EmptyInput);
        }
        for entry in &entries {
            entry.validate()?;
        }

        let builder = Builder {
            heuristic,
            parallel_threshold: PARALLEL_SPLIT_THRESHOLD,
        };
        Ok(builder.build_node(entries, depth))
    }

    pub fn bounds(&self) -> &BoundingBox {
        match self {
            TreeNode::Leaf { bounds, .. } => bounds,
            TreeNode::Internal { bounds, .. } => bounds,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Number of entries stored beneath this node.
    pub fn len(&self) -> usize {
        match self {
            TreeNode::Leaf { entries, .. } => entries.len(),
            TreeNode::Internal { left, right, .. } => left.len() + right.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the ids whose boxes intersect `query`.
    pub fn search(&self, query: &BoundingBox) -> Vec<FeatureId> {
        let mut results = Vec::new();
        self.search_into(query, SearchMode::Exact, &mut results);
        results
    }

    /// Appends matching ids to `results` in left-to-right leaf order.
    ///
    /// Subtrees whose bounds miss the query are never visited.
    pub fn search_into(&self, query: &BoundingBox, mode: SearchMode, results: &mut Vec<FeatureId>) {
        if !self.bounds().intersects(query) {
            return;
        }

        match self {
            TreeNode::Leaf { entries, .. } => match mode {
                SearchMode::Exact => results.extend(
                    entries
                        .iter()
                        .filter(|entry| entry.bbox.intersects(query))
                        .map(|entry| entry.id),
                ),
                SearchMode::Candidates => results.extend(entries.iter().map(|entry| entry.id)),
            },
            TreeNode::Internal { left, right, .. } => {
                left.search_into(query, mode, results);
                right.search_into(query, mode, results);
            }
        }
    }

    /// Lazy version of [`TreeNode::search`]. Each call starts a fresh walk.
    pub fn search_iter(&self, query: BoundingBox) -> SearchIter<'_> {
        SearchIter {
            query,
            stack: vec![self],
            leaf: Default::default(),
        }
    }

    /// Copies out every entry in left-to-right leaf order.
    pub fn collect_entries(&self) -> Vec<IndexEntry> {
        let mut entries = Vec::with_capacity(self.len());
        self.collect_entries_recursive(&mut entries);
        entries
    }

    fn collect_entries_recursive(&self, out: &mut Vec<IndexEntry>) {
        match self {
            TreeNode::Leaf { entries, .. } => out.extend_from_slice(entries),
            TreeNode::Internal { left, right, .. } => {
                left.collect_entries_recursive(out);
                right.collect_entries_recursive(out);
            }
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.collect_stats(0, &mut stats);
        stats
    }

    fn collect_stats(&self, depth: u32, stats: &mut TreeStats) {
        stats.node_count += 1;
        stats.depth = stats.depth.max(depth);
        match self {
            TreeNode::Leaf { entries, .. } => {
                let size = entries.len() as u64;
                stats.leaf_count += 1;
                stats.entry_count += size;
                stats.max_leaf_size = stats.max_leaf_size.max(size);
            }
            TreeNode::Internal { left, right, .. } => {
                left.collect_stats(depth + 1, stats);
                right.collect_stats(depth + 1, stats);
            }
        }
    }

    /// Verifies every node: finite, well-ordered bounds equal to the exact
    /// join of what lies beneath, and no empty leaves.
    pub fn check_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport::new();
        let mut path = String::from("root");
        self.check_recursive(0, &mut path, &mut report);
        report
    }

    fn check_recursive(&self, depth: u32, path: &mut String, report: &mut IntegrityReport) {
        report.nodes_checked += 1;
        report.max_depth = report.max_depth.max(depth);

        let bounds = self.bounds();
        if let Err(reason) = bounds.check() {
            report.fail(path, format!("node bounds {} rejected: {}", bounds, reason));
        }

        match self {
            TreeNode::Leaf { entries, .. } => {
                report.leaf_count += 1;
                for entry in entries {
                    if let Err(reason) = entry.bbox.check() {
                        report.fail(path, format!("entry {} rejected: {}", entry.id, reason));
                    }
                }
                match BoundingBox::join_all(entries.iter().map(|entry| &entry.bbox)) {
                    None => report.fail(path, "leaf has no entries".to_string()),
                    Some(expected) if expected != *bounds => report.fail(
                        path,
                        format!("leaf bounds {} differ from entry join {}", bounds, expected),
                    ),
                    Some(_) => {}
                }
            }
            TreeNode::Internal { left, right, .. } => {
                let expected = left.bounds().join(right.bounds());
                if expected != *bounds {
                    report.fail(
                        path,
                        format!("node bounds {} differ from child join {}", bounds, expected),
                    );
                }

                let len = path.len();
                path.push_str(".L");
                left.check_recursive(depth + 1, path, report);
                path.truncate(len);
                path.push_str(".R");
                right.check_recursive(depth + 1, path, report);
                path.truncate(len);
            }
        }
    }
}

/// Recursive partitioning state shared by every node of one build.
struct Builder<'h> {
    heuristic: &'h Heuristic,
    parallel_threshold: usize,
}

impl Builder<'_> {
    /// `entries` must be non-empty and pre-validated.
    fn build_node(&self, entries: Vec<IndexEntry>, depth: u32) -> TreeNode {
        debug_assert!(!entries.is_empty());
        let bounds = entries[1..]
            .iter()
            .fold(entries[0].bbox, |acc, entry| acc.join(&entry.bbox));

        if !self.heuristic.should_split(depth, entries.len(), &bounds) {
            return TreeNode::Leaf { bounds, entries };
        }

        let axis = bounds.long_axis();
        let (front, back) = match partition(entries, axis) {
            Ok(buckets) => buckets,
            Err(entries) if self.heuristic.retry_secondary_axis => {
                match partition(entries, axis.other()) {
                    Ok(buckets) => buckets,
                    Err(entries) => return degenerate_leaf(bounds, entries, depth),
                }
            }
            Err(entries) => return degenerate_leaf(bounds, entries, depth),
        };

        let (left, right) = self.build_children(front, back, depth + 1);
        TreeNode::Internal {
            bounds,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[cfg(feature = "parallel")]
    fn build_children(
        &self,
        front: Vec<IndexEntry>,
        back: Vec<IndexEntry>,
        depth: u32,
    ) -> (TreeNode, TreeNode) {
        if front.len() + back.len() >= self.parallel_threshold {
            rayon::join(
                || self.build_node(front, depth),
                || self.build_node(back, depth),
            )
        } else {
            (self.build_node(front, depth), self.build_node(back, depth))
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn build_children(
        &self,
        front: Vec<IndexEntry>,
        back: Vec<IndexEntry>,
        depth: u32,
    ) -> (TreeNode, TreeNode) {
        let _ = self.parallel_threshold;
        (self.build_node(front, depth), self.build_node(back, depth))
    }
}

fn degenerate_leaf(bounds: BoundingBox, entries: Vec<IndexEntry>, depth: u32) -> TreeNode {
    log::trace!(
        "All {} centroids coincide at depth {}, keeping a leaf over {}",
        entries.len(),
        depth,
        bounds
    );
    TreeNode::Leaf { bounds, entries }
}

/// Splits entries around the mean centroid on `axis`: centroids at or above
/// the mean go to the first bucket. Relative order is kept in both buckets.
///
/// Hands the entries back untouched when either bucket would be empty.
fn partition(
    entries: Vec<IndexEntry>,
    axis: Axis,
) -> Result<(Vec<IndexEntry>, Vec<IndexEntry>), Vec<IndexEntry>> {
    // running mean, scaled before subtracting so extreme coordinates stay finite
    let mut mean = 0.0;
    for (i, entry) in entries.iter().enumerate() {
        let k = (i + 1) as f64;
        mean += entry.bbox.centroid_on(axis) / k - mean / k;
    }

    let (front, back): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|entry| entry.bbox.centroid_on(axis) >= mean);

    if front.is_empty() {
        Err(back)
    } else if back.is_empty() {
        Err(front)
    } else {
        Ok((front, back))
    }
}

/// Iterator returned by [`TreeNode::search_iter`].
#[derive(Debug)]
pub struct SearchIter<'a> {
    query: BoundingBox,
    stack: Vec<&'a TreeNode>,
    leaf: std::slice::Iter<'a, IndexEntry>,
}

impl Iterator for SearchIter<'_> {
    type Item = FeatureId;

    fn next(&mut self) -> Option<FeatureId> {
        loop {
            for entry in self.leaf.by_ref() {
                if entry.bbox.intersects(&self.query) {
                    return Some(entry.id);
                }
            }

            let node = self.stack.pop()?;
            if !node.bounds().intersects(&self.query) {
                continue;
            }
            match node {
                TreeNode::Leaf { entries, .. } => self.leaf = entries.iter(),
                TreeNode::Internal { left, right, .. } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
    }
}
