//! Binary persistence for feature trees.
//!
//! Layout, little-endian throughout:
//!
//! ```text
//! File    := VersionTag(f64) Node
//! Node    := Bounds(4 x f64) IsLeaf(u8) Payload
//! Leaf    := Count(i32) { Box(4 x f64) Id(i32) } * Count
//! Inner   := Node(left) Node(right)
//! ```
//!
//! There is no length prefix for internal nodes; truncation shows up as
//! a read past the end of the stream. A read either yields a complete,
//! structurally valid tree or an error.

use std::io::{self, Read, Write};

use bincode::config::{self, Config};
use bincode::error::{DecodeError, EncodeError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::entry::IndexEntry;
use crate::errors::{IndexError, IndexResult};
use crate::heuristic::MAX_TREE_DEPTH;
use crate::tree_node::TreeNode;

/// Leading tag of every index stream understood by this reader.
pub const INDEX_FORMAT_VERSION: f64 = 1.0;

/// Upper bound on entries preallocated for one leaf from an untrusted count.
const MAX_LEAF_PREALLOC: usize = 1024;

/// Bounds as laid out on disk: min_x, min_y, max_x, max_y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct BoundsRecord {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl BoundsRecord {
    fn from_bbox(b: &BoundingBox) -> Self {
        Self {
            min_x: b.min_x,
            min_y: b.min_y,
            max_x: b.max_x,
            max_y: b.max_y,
        }
    }

    fn to_bbox(self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// A leaf entry as laid out on disk. Ids keep their bit pattern as `i32`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct EntryRecord {
    bbox: BoundsRecord,
    id: i32,
}

fn wire_config() -> impl Config {
    // fixed-width little-endian integers, one byte per bool
    config::legacy()
}

/// Writes `root` to `out`, version tag first.
pub fn write_tree<W: Write + ?Sized>(root: &TreeNode, out: &mut W) -> IndexResult<()> {
    let mut encoder = NodeEncoder { writer: out };
    encoder.put(INDEX_FORMAT_VERSION)?;
    encoder.write_node(root)
}

/// Reads a tree written by [`write_tree`].
///
/// The version tag is checked before any node bytes are consumed.
pub fn read_tree<R: Read + ?Sized>(input: &mut R) -> IndexResult<TreeNode> {
    let mut decoder = NodeDecoder { reader: input };

    let version: f64 = decoder.get()?;
    if version.to_bits() != INDEX_FORMAT_VERSION.to_bits() {
        return Err(IndexError::UnsupportedFormatVersion {
            found: version,
            expected: INDEX_FORMAT_VERSION,
        });
    }

    let root = decoder.read_node(0)?;
    let report = root.check_integrity();
    if !report.is_valid {
        log::warn!(
            "Rejecting decoded index with {} structural errors",
            report.errors.len()
        );
        let first = report.errors.into_iter().next().unwrap_or_default();
        return Err(IndexError::CorruptIndex(first));
    }
    Ok(root)
}

struct NodeEncoder<'w, W: Write + ?Sized> {
    writer: &'w mut W,
}

impl<W: Write + ?Sized> NodeEncoder<'_, W> {
    fn put<T: Serialize>(&mut self, value: T) -> IndexResult<()> {
        bincode::serde::encode_into_std_write(value, &mut self.writer, wire_config())
            .map(|_| ())
            .map_err(map_encode_error)
    }

    fn write_node(&mut self, node: &TreeNode) -> IndexResult<()> {
        self.put(BoundsRecord::from_bbox(node.bounds()))?;
        match node {
            TreeNode::Leaf { entries, .. } => {
                let count = i32::try_from(entries.len()).map_err(|_| {
                    IndexError::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Leaf with {} entries does not fit the format", entries.len()),
                    ))
                })?;
                self.put(true)?;
                self.put(count)?;
                for entry in entries {
                    self.put(EntryRecord {
                        bbox: BoundsRecord::from_bbox(&entry.bbox),
                        id: entry.id as i32,
                    })?;
                }
                Ok(())
            }
            TreeNode::Internal { left, right, .. } => {
                self.put(false)?;
                self.write_node(left)?;
                self.write_node(right)
            }
        }
    }
}

struct NodeDecoder<'r, R: Read + ?Sized> {
    reader: &'r mut R,
}

impl<R: Read + ?Sized> NodeDecoder<'_, R> {
    fn get<T: DeserializeOwned>(&mut self) -> IndexResult<T> {
        bincode::serde::decode_from_std_read(&mut self.reader, wire_config())
            .map_err(map_decode_error)
    }

    fn read_node(&mut self, depth: u32) -> IndexResult<TreeNode> {
        if depth > MAX_TREE_DEPTH {
            return Err(IndexError::CorruptIndex(format!(
                "Node nesting exceeds {} levels",
                MAX_TREE_DEPTH
            )));
        }

        let bounds = self.get::<BoundsRecord>()?.to_bbox();
        let is_leaf: bool = self.get()?;

        if is_leaf {
            let count: i32 = self.get()?;
            if count <= 0 {
                return Err(IndexError::CorruptIndex(format!(
                    "Leaf at depth {} declares {} entries",
                    depth, count
                )));
            }
            let count = count as usize;
            let mut entries = Vec::with_capacity(count.min(MAX_LEAF_PREALLOC));
            for _ in 0..count {
                let record: EntryRecord = self.get()?;
                entries.push(IndexEntry::new(record.bbox.to_bbox(), record.id as u32));
            }
            Ok(TreeNode::Leaf { bounds, entries })
        } else {
            let left = self.read_node(depth + 1)?;
            let right = self.read_node(depth + 1)?;
            Ok(TreeNode::Internal {
                bounds,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

fn map_encode_error(err: EncodeError) -> IndexError {
    match err {
        EncodeError::Io { inner, .. } => IndexError::Io(inner),
        other => IndexError::Io(io::Error::other(other.to_string())),
    }
}

fn map_decode_error(err: DecodeError) -> IndexError {
    match err {
        DecodeError::Io { inner, .. } if inner.kind() == io::ErrorKind::UnexpectedEof => {
            IndexError::CorruptIndex("Unexpected end of index stream".to_string())
        }
        DecodeError::Io { inner, .. } => IndexError::Io(inner),
        DecodeError::UnexpectedEnd { .. } => {
            IndexError::CorruptIndex("Unexpected end of index stream".to_string())
        }
        other => IndexError::CorruptIndex(other.to_string()),
    }
}
