//! # Feature Tree - Static Bounding-Box Index for Map Features
//!
//! This crate provides a bulk-built binary tree over feature bounding boxes,
//! answering "which features overlap this box" for rendering passes and
//! hit-testing without scanning every feature.
//!
//! ## Features
//!
//! - **Bulk Construction**: Mean-centroid splits along the longer axis,
//!   steered by a configurable [`Heuristic`]
//! - **Pruned Search**: Only subtrees whose bounds overlap the query are visited
//! - **Immutable Trees**: Safe for any number of concurrent readers
//! - **Persistent**: Compact versioned binary format for caching across restarts
//! - **Snapshot Swapping**: [`IndexProvider`] replaces the index wholesale on reload
//!
//! ## Quick Start
//!
//! ```rust
//! use feature_tree::{build_index, load_index, BoundingBox, Heuristic, IndexEntry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let entries = vec![
//!     IndexEntry::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1),
//!     IndexEntry::new(BoundingBox::new(20.0, 20.0, 30.0, 30.0), 2),
//!     IndexEntry::new(BoundingBox::new(5.0, 5.0, 15.0, 15.0), 3),
//! ];
//!
//! let heuristic = Heuristic::new(10, 1, 1, 0.0);
//! let index = build_index(entries, &heuristic)?.expect("non-empty input");
//!
//! let mut hits = index.search(&BoundingBox::new(0.0, 0.0, 12.0, 12.0));
//! hits.sort();
//! assert_eq!(hits, vec![1, 3]);
//!
//! // Cache the index and read it back
//! let mut bytes = Vec::new();
//! index.save(&mut bytes)?;
//! let restored = load_index(&mut bytes.as_slice())?;
//! assert_eq!(restored, index);
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod codec;
pub mod entry;
pub mod errors;
pub mod heuristic;
pub mod provider;
pub mod spatial_index;
pub mod tree_node;

pub use bounding_box::{Axis, BoundingBox};
pub use codec::{read_tree, write_tree, INDEX_FORMAT_VERSION};
pub use entry::{FeatureId, IndexEntry};
pub use errors::{IndexError, IndexResult};
pub use heuristic::{Heuristic, MAX_TREE_DEPTH};
pub use provider::IndexProvider;
pub use spatial_index::{build_index, load_index, load_index_from_path, SpatialIndex};
pub use tree_node::{IntegrityReport, SearchIter, SearchMode, TreeNode, TreeStats};
