//! MerkleTree and `ORMapMerkleTree` for efficient delta synchronization.
//!
//! Both trees use a prefix trie structure keyed by hex digits of the FNV-1a hash
//! of entry keys. The trie depth (default 3) determines bucket granularity.
//! Nodes compare root hashes to identify differing subtrees, then walk down
//! to discover the specific keys that need synchronization.

use std::collections::HashMap;

use crate::hash::{combine_hashes, fnv1a_hash};

/// Fanout per trie level: one child per hex digit.
const FANOUT: usize = 16;

fn hex_digit_at(hash: u32, level: usize) -> usize {
    let shift = (7usize.saturating_sub(level)) * 4;
    ((hash >> shift) & 0xF) as usize
}

/// A single node in a [`MerkleTree`].
///
/// Internal nodes (above the leaf level) hold a fixed-size `children` array
/// indexed by hex digit; leaf nodes hold the keys routed to that bucket
/// together with their individual item hashes, so a repair exchange can
/// answer "which keys are in this bucket" without a second pass over the map.
#[derive(Debug, Clone, Default)]
pub struct MerkleNode {
    /// Combined hash of everything below this node.
    pub hash: u32,
    /// Child nodes by hex digit; empty for leaf nodes.
    pub children: Vec<Option<MerkleNode>>,
    /// Key -> item hash, populated only at leaf nodes.
    pub keys: HashMap<String, u32>,
}

impl MerkleNode {
    fn leaf() -> Self {
        Self::default()
    }

    fn internal() -> Self {
        Self {
            hash: 0,
            children: (0..FANOUT).map(|_| None).collect(),
            keys: HashMap::new(),
        }
    }

    fn is_internal(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Fixed-fanout (hex-digit) prefix trie over FNV-1a-hashed keys.
///
/// Bucket hashes are maintained incrementally: inserting or removing a key
/// XOR-folds its item hash into the leaf bucket, then the delta bubbles up
/// to every ancestor, so `update`/`remove` are `O(depth)` rather than
/// `O(size)`. Root-hash equality between two trees over the same key space
/// implies their full contents match; a mismatch is resolved by walking
/// down one differing hex digit at a time (see `bucket_hashes`/`leaf_keys`).
#[derive(Debug, Clone)]
pub struct MerkleTree {
    depth: usize,
    root: Option<MerkleNode>,
}

impl MerkleTree {
    /// Creates an empty tree with the given trie depth (number of hex-digit
    /// levels before reaching leaf buckets).
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self { depth, root: None }
    }

    /// Creates an empty tree at the default depth (3), matching the
    /// cross-language default bucket granularity.
    #[must_use]
    pub fn default_depth() -> Self {
        Self::new(3)
    }

    /// Configured trie depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Root hash of the whole tree, or 0 if empty.
    #[must_use]
    pub fn get_root_hash(&self) -> u32 {
        self.root.as_ref().map_or(0, |n| n.hash)
    }

    /// Inserts or updates the item hash for `key`, bubbling the change up
    /// from the leaf bucket to the root.
    pub fn update(&mut self, key: &str, item_hash: u32) {
        let path_hash = fnv1a_hash(key);
        let depth = self.depth;
        let root = self
            .root
            .get_or_insert_with(|| Self::new_node_for_level(0, depth));
        Self::insert(root, path_hash, 0, depth, key, item_hash);
    }

    /// Removes `key` from the tree, bubbling the change up. Pruning empty
    /// subtrees keeps `get_root_hash()` back at 0 once the tree is empty.
    pub fn remove(&mut self, key: &str) {
        let path_hash = fnv1a_hash(key);
        let depth = self.depth;
        let became_empty = match self.root.as_mut() {
            Some(root) => Self::delete(root, path_hash, 0, depth, key),
            None => return,
        };
        if became_empty {
            self.root = None;
        }
    }

    /// Returns `(hex_digit, bucket_hash)` for every populated child of the
    /// node reached by following `path` (a sequence of hex digits) from the
    /// root. Used to answer `MERKLE_REQ_BUCKET` for internal nodes.
    #[must_use]
    pub fn bucket_hashes(&self, path: &[u8]) -> Vec<(u8, u32)> {
        let Some(node) = self.node_at(path) else {
            return Vec::new();
        };
        if !node.is_internal() {
            return Vec::new();
        }
        node.children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i as u8, c.hash)))
            .collect()
    }

    /// Returns the keys (and their item hashes) stored in the leaf reached
    /// by `path`. Used to answer the sync leaf-exchange step once both
    /// sides have walked down to a differing bucket.
    #[must_use]
    pub fn leaf_keys(&self, path: &[u8]) -> HashMap<String, u32> {
        self.node_at(path)
            .map(|n| n.keys.clone())
            .unwrap_or_default()
    }

    fn node_at(&self, path: &[u8]) -> Option<&MerkleNode> {
        let mut node = self.root.as_ref()?;
        for &digit in path {
            node = node.children.get(digit as usize)?.as_ref()?;
        }
        Some(node)
    }

    fn new_node_for_level(level: usize, depth: usize) -> MerkleNode {
        if level == depth {
            MerkleNode::leaf()
        } else {
            MerkleNode::internal()
        }
    }

    fn insert(node: &mut MerkleNode, path_hash: u32, level: usize, depth: usize, key: &str, item_hash: u32) {
        if level == depth {
            let previous = node.keys.insert(key.to_string(), item_hash);
            node.hash = combine_hashes(&[node.hash, previous.unwrap_or(0), item_hash]);
            return;
        }
        let digit = hex_digit_at(path_hash, level);
        let child = node.children[digit]
            .get_or_insert_with(|| Self::new_node_for_level(level + 1, depth));
        let before = child.hash;
        Self::insert(child, path_hash, level + 1, depth, key, item_hash);
        let after = child.hash;
        node.hash = combine_hashes(&[node.hash, before, after]);
    }

    /// Returns true if `node` has no remaining entries below it and should
    /// be pruned by its caller.
    fn delete(node: &mut MerkleNode, path_hash: u32, level: usize, depth: usize, key: &str) -> bool {
        if level == depth {
            if let Some(old) = node.keys.remove(key) {
                node.hash = combine_hashes(&[node.hash, old]);
            }
            return node.keys.is_empty();
        }
        let digit = hex_digit_at(path_hash, level);
        let Some(child) = node.children[digit].as_mut() else {
            return node.children.iter().all(Option::is_none);
        };
        let before = child.hash;
        let child_empty = Self::delete(child, path_hash, level + 1, depth, key);
        if child_empty {
            node.children[digit] = None;
            node.hash = combine_hashes(&[node.hash, before]);
        } else {
            let after = node.children[digit].as_ref().map_or(0, |c| c.hash);
            node.hash = combine_hashes(&[node.hash, before, after]);
        }
        node.children.iter().all(Option::is_none)
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::default_depth()
    }
}

/// `MerkleTree` specialized for `ORMap` usage.
///
/// `ORMap` computes one combined entry hash per key (folding together every
/// live `ORRecord` for that key via `canonical_json`) before calling
/// `update`/`remove`, so the same incremental trie structure as `LWWMap`
/// applies unchanged; this alias keeps the two call sites type-distinct in
/// signatures without duplicating the trie implementation.
pub type ORMapMerkleTree = MerkleTree;
