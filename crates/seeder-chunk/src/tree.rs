//! Chunk tree: splits a payload into bounded chunks and commits to them with
//! a binary Merkle tree whose nodes also commit to byte offsets.
//!
//! Leaves are `H(chunk_hash, end)`; branches are `H(left, right, split)` where
//! `split` is the exclusive end offset of the left subtree. A proof path lists
//! every branch from the root down (`left ‖ right ‖ split`, 96 bytes each)
//! followed by the leaf (`chunk_hash ‖ end`, 64 bytes). Offsets are encoded
//! as 32-byte big-endian notes.

use seeder_types::{b64_encode, Chunk};

use crate::error::{ChunkError, ChunkResult};

/// Upper bound on a chunk's length.
pub const MAX_CHUNK_SIZE: usize = 256 * 1024;

/// Smallest tail chunk left behind before the last two chunks are balanced.
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

pub const HASH_SIZE: usize = 32;
pub const NOTE_SIZE: usize = 32;

const LEAF_PROOF_SIZE: usize = HASH_SIZE + NOTE_SIZE;
const BRANCH_PROOF_SIZE: usize = HASH_SIZE * 2 + NOTE_SIZE;

pub type Hash = [u8; HASH_SIZE];

/// Byte range of one chunk within its payload, `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Result of checking a proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedChunk {
    pub range: ChunkRange,
    pub chunk_hash: Hash,
}

/// Chunk boundaries for a payload of `size` bytes.
///
/// Depends only on the size. Full chunks are `MAX_CHUNK_SIZE`; when cutting
/// a full chunk would leave a tail shorter than `MIN_CHUNK_SIZE`, the
/// remainder is split in two with the first half rounded up.
pub fn chunk_ranges(size: u64) -> Vec<ChunkRange> {
    let max = MAX_CHUNK_SIZE as u64;
    let min = MIN_CHUNK_SIZE as u64;
    let mut ranges = Vec::with_capacity((size / max + 1) as usize);
    let mut cursor = 0u64;
    let mut rest = size;

    while rest >= max {
        let mut len = max;
        let tail = rest - max;
        if tail > 0 && tail < min {
            len = rest.div_ceil(2);
        }
        ranges.push(ChunkRange {
            start: cursor,
            end: cursor + len,
        });
        cursor += len;
        rest -= len;
    }
    if rest > 0 {
        ranges.push(ChunkRange {
            start: cursor,
            end: cursor + rest,
        });
    }
    ranges
}

/// Content hash of one chunk.
pub fn chunk_hash(data: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"seeder-chunk-v1:");
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

fn note(offset: u64) -> [u8; NOTE_SIZE] {
    let mut out = [0u8; NOTE_SIZE];
    out[NOTE_SIZE - 8..].copy_from_slice(&offset.to_be_bytes());
    out
}

fn read_note(bytes: &[u8]) -> Option<u64> {
    let (high, low) = bytes.split_at(NOTE_SIZE - 8);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    Some(u64::from_be_bytes(low.try_into().ok()?))
}

fn hash_leaf(chunk_hash: &[u8], end_note: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"seeder-leaf-v1:");
    hasher.update(chunk_hash);
    hasher.update(end_note);
    *hasher.finalize().as_bytes()
}

fn hash_branch(left: &[u8], right: &[u8], split_note: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"seeder-branch-v1:");
    hasher.update(left);
    hasher.update(right);
    hasher.update(split_note);
    *hasher.finalize().as_bytes()
}

enum Node {
    Leaf {
        id: Hash,
        chunk_hash: Hash,
        end: u64,
    },
    Branch {
        id: Hash,
        left: Box<Node>,
        right: Box<Node>,
        end: u64,
    },
}

impl Node {
    fn id(&self) -> &Hash {
        match self {
            Node::Leaf { id, .. } | Node::Branch { id, .. } => id,
        }
    }

    fn end(&self) -> u64 {
        match self {
            Node::Leaf { end, .. } | Node::Branch { end, .. } => *end,
        }
    }
}

/// One chunk of a built tree with its proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeChunk {
    pub range: ChunkRange,
    pub chunk_hash: Hash,
    pub data_path: Vec<u8>,
}

/// Chunk tree over a complete payload.
#[derive(Clone, Debug)]
pub struct ChunkTree {
    root: Hash,
    size: u64,
    chunks: Vec<TreeChunk>,
}

impl ChunkTree {
    /// Build the tree for `payload`.
    ///
    /// An empty payload yields an all-zero root and no chunks.
    pub fn build(payload: &[u8]) -> Self {
        let size = payload.len() as u64;
        let mut layer: Vec<Node> = chunk_ranges(size)
            .into_iter()
            .map(|range| {
                let data = &payload[range.start as usize..range.end as usize];
                let chunk_hash = chunk_hash(data);
                Node::Leaf {
                    id: hash_leaf(&chunk_hash, &note(range.end)),
                    chunk_hash,
                    end: range.end,
                }
            })
            .collect();

        if layer.is_empty() {
            return Self {
                root: [0u8; HASH_SIZE],
                size,
                chunks: Vec::new(),
            };
        }

        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            let mut nodes = layer.into_iter();
            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => {
                        let split = left.end();
                        next.push(Node::Branch {
                            id: hash_branch(left.id(), right.id(), &note(split)),
                            end: right.end(),
                            left: Box::new(left),
                            right: Box::new(right),
                        });
                    }
                    // Odd node is promoted unchanged.
                    None => next.push(left),
                }
            }
            layer = next;
        }

        let root_node = layer.remove(0);
        let mut chunks = Vec::new();
        collect_proofs(&root_node, 0, Vec::new(), &mut chunks);
        Self {
            root: *root_node.id(),
            size,
            chunks,
        }
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    /// Base64url form of the root, as carried in `data_root`.
    pub fn data_root(&self) -> String {
        b64_encode(&self.root)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn chunks(&self) -> &[TreeChunk] {
        &self.chunks
    }

    /// Wire chunks for `payload`, which must be the payload the tree was built from.
    pub fn to_chunks(&self, payload: &[u8]) -> Vec<Chunk> {
        let data_root = self.data_root();
        self.chunks
            .iter()
            .map(|c| Chunk {
                data_root: data_root.clone(),
                data_size: self.size.to_string(),
                data_path: c.data_path.clone(),
                offset: (c.range.end - 1).to_string(),
                chunk: payload[c.range.start as usize..c.range.end as usize].to_vec(),
            })
            .collect()
    }
}

fn collect_proofs(node: &Node, start: u64, prefix: Vec<u8>, out: &mut Vec<TreeChunk>) {
    match node {
        Node::Leaf {
            chunk_hash, end, ..
        } => {
            let mut path = prefix;
            path.extend_from_slice(chunk_hash);
            path.extend_from_slice(&note(*end));
            out.push(TreeChunk {
                range: ChunkRange { start, end: *end },
                chunk_hash: *chunk_hash,
                data_path: path,
            });
        }
        Node::Branch { left, right, .. } => {
            let mut path = prefix;
            path.extend_from_slice(left.id());
            path.extend_from_slice(right.id());
            path.extend_from_slice(&note(left.end()));
            collect_proofs(left, start, path.clone(), out);
            collect_proofs(right, left.end(), path, out);
        }
    }
}

/// Check `path` against `root` for the chunk containing byte `offset` of a
/// payload of `size` bytes. Returns the chunk's range and content hash.
pub fn validate_path(root: &Hash, offset: u64, size: u64, path: &[u8]) -> ChunkResult<ValidatedChunk> {
    if size == 0 || offset >= size {
        return Err(ChunkError::InvalidProof(format!(
            "offset {offset} outside payload of {size} bytes"
        )));
    }
    if path.len() < LEAF_PROOF_SIZE || (path.len() - LEAF_PROOF_SIZE) % BRANCH_PROOF_SIZE != 0 {
        return Err(ChunkError::InvalidProof(format!("bad path length {}", path.len())));
    }

    let mut expected = *root;
    let mut left_bound = 0u64;
    let mut right_bound = size;
    let (branches, leaf) = path.split_at(path.len() - LEAF_PROOF_SIZE);

    for branch in branches.chunks_exact(BRANCH_PROOF_SIZE) {
        let (left, rest) = branch.split_at(HASH_SIZE);
        let (right, split_note) = rest.split_at(HASH_SIZE);
        if hash_branch(left, right, split_note) != expected {
            return Err(ChunkError::InvalidProof("branch hash mismatch".into()));
        }
        let split = read_note(split_note)
            .ok_or_else(|| ChunkError::InvalidProof("branch note out of range".into()))?;
        let next = if offset < split {
            right_bound = right_bound.min(split);
            left
        } else {
            left_bound = left_bound.max(split);
            right
        };
        expected.copy_from_slice(next);
    }

    let (hash, end_note) = leaf.split_at(HASH_SIZE);
    if hash_leaf(hash, end_note) != expected {
        return Err(ChunkError::InvalidProof("leaf hash mismatch".into()));
    }
    let end = read_note(end_note)
        .ok_or_else(|| ChunkError::InvalidProof("leaf note out of range".into()))?;
    if end <= left_bound || end > right_bound || offset >= end {
        return Err(ChunkError::InvalidProof(format!(
            "leaf end {end} outside [{left_bound}, {right_bound}]"
        )));
    }

    let mut chunk_hash = [0u8; HASH_SIZE];
    chunk_hash.copy_from_slice(hash);
    Ok(ValidatedChunk {
        range: ChunkRange {
            start: left_bound,
            end,
        },
        chunk_hash,
    })
}
