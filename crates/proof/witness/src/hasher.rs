//! Streaming derivation of the root of an index-keyed Merkle Patricia Trie.
//!
//! The keys `rlp(0), rlp(1), ..` are visited in sorted order, and the trie is folded over ranges of
//! that order: a range sharing a common path becomes an extension, a range that splits becomes a
//! branch and a single key becomes a leaf. Only the encodings along the path currently being
//! folded are alive at any time; the full trie is never built.

use crate::{
    DerivableList,
    length::{
        list_prefix_len, string_len, string_len_double, write_list_prefix, write_string,
        write_string_double, write_uint,
    },
    util::adjust_index_for_rlp,
};
use alloc::{vec, vec::Vec};
use alloy_primitives::{B256, keccak256};
use alloy_rlp::EMPTY_STRING_CODE;
use alloy_trie::{EMPTY_ROOT_HASH, Nibbles, nodes::encode_path_leaf};
use tracing::debug;

/// Node encodings shorter than this are embedded into their parent rather than hashed.
pub const EMBED_THRESHOLD: usize = B256::len_bytes();

/// The number of children of a branch node.
const BRANCH_WIDTH: u8 = 16;

/// The length of a hashed child reference, `0xA0 ++ keccak256(node)`.
const HASHED_REF_LEN: usize = B256::len_bytes() + 1;

/// Derives the trie root of `list`, keying the item at index `i` by `rlp(i)`.
///
/// The items are stored in the leaves as they are returned by [DerivableList::get_raw]. An empty
/// list commits to [EMPTY_ROOT_HASH].
pub fn derive_root<L: DerivableList + ?Sized>(list: &L) -> B256 {
    OrderedRoot::new(list, LeafValue::Encoded).root()
}

/// Derives the trie root of `list` where every item is a raw byte string rather than an encoded
/// value: the leaf for index `i` stores `rlp(get_raw(i))`, as storage tries do for slot values.
pub fn derive_root_of_values<L: DerivableList + ?Sized>(list: &L) -> B256 {
    OrderedRoot::new(list, LeafValue::Raw).root()
}

/// How an item is placed into its leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafValue {
    /// The item is already encoded and is wrapped once.
    Encoded,
    /// The item is a raw string, encoded and then wrapped again.
    Raw,
}

/// The fold over the sorted keys of an ordered list.
#[derive(Debug)]
struct OrderedRoot<'a, L: ?Sized> {
    list: &'a L,
    /// Keys in sorted order, paired with the index of the item each one addresses.
    keys: Vec<(Nibbles, usize)>,
    leaf_value: LeafValue,
}

impl<'a, L: DerivableList + ?Sized> OrderedRoot<'a, L> {
    fn new(list: &'a L, leaf_value: LeafValue) -> Self {
        let len = list.len();
        let mut key = [0u8; 9];
        let keys = (0..len)
            .map(|position| {
                let index = adjust_index_for_rlp(position, len);
                let end = write_uint(&mut key, 0, index as u64);
                (Nibbles::unpack(&key[..end]), index)
            })
            .collect();
        Self { list, keys, leaf_value }
    }

    fn root(&self) -> B256 {
        let root = if self.keys.is_empty() {
            EMPTY_ROOT_HASH
        } else {
            // The root is always hashed, however short its encoding.
            keccak256(self.node(0, self.keys.len(), 0))
        };
        debug!(target: "trie_hasher", items = self.keys.len(), %root, "Derived ordered trie root");
        root
    }

    /// Returns the encoding of the node holding the keys in `lo..hi`, whose paths below `depth`
    /// nibbles are not yet consumed by its ancestors.
    fn node(&self, lo: usize, hi: usize, depth: usize) -> Vec<u8> {
        let (first, index) = &self.keys[lo];
        if hi - lo == 1 {
            return self.leaf(&first.slice(depth..), *index);
        }

        // The keys are sorted, so the first and last key bound the prefix shared by the range.
        let (last, _) = &self.keys[hi - 1];
        let shared = first.slice(depth..).common_prefix_length(&last.slice(depth..));
        if shared == 0 {
            self.branch(lo, hi, depth)
        } else {
            let branch = self.branch(lo, hi, depth + shared);
            extension(&first.slice(depth..depth + shared), &branch)
        }
    }

    fn leaf(&self, path: &Nibbles, index: usize) -> Vec<u8> {
        let path = encode_path_leaf(path, true);
        let value = self.list.get_raw(index);
        let value_len = match self.leaf_value {
            LeafValue::Encoded => string_len(&value),
            LeafValue::Raw => string_len_double(&value),
        };

        let payload_len = string_len(path.as_slice()) + value_len;
        let mut out = vec![0; list_prefix_len(payload_len) + payload_len];
        let pos = write_list_prefix(&mut out, 0, payload_len);
        let pos = write_string(&mut out, pos, path.as_slice());
        let pos = match self.leaf_value {
            LeafValue::Encoded => write_string(&mut out, pos, &value),
            LeafValue::Raw => write_string_double(&mut out, pos, &value),
        };
        debug_assert_eq!(pos, out.len());
        out
    }

    fn branch(&self, lo: usize, hi: usize, depth: usize) -> Vec<u8> {
        // Index keys are prefix free, so no key ends at a branch and the value slot stays empty.
        debug_assert!(self.keys[lo..hi].iter().all(|(key, _)| key.len() > depth));

        let mut payload = Vec::with_capacity(BRANCH_WIDTH as usize * HASHED_REF_LEN + 1);
        let mut start = lo;
        for nibble in 0..BRANCH_WIDTH {
            let end = start
                + self.keys[start..hi]
                    .iter()
                    .take_while(|(key, _)| key.get(depth) == Some(nibble))
                    .count();
            if end == start {
                payload.push(EMPTY_STRING_CODE);
            } else {
                push_child_ref(&mut payload, &self.node(start, end, depth + 1));
            }
            start = end;
        }
        debug_assert_eq!(start, hi);
        payload.push(EMPTY_STRING_CODE);

        let mut out = vec![0; list_prefix_len(payload.len()) + payload.len()];
        let pos = write_list_prefix(&mut out, 0, payload.len());
        out[pos..].copy_from_slice(&payload);
        out
    }
}

fn extension(path: &Nibbles, child: &[u8]) -> Vec<u8> {
    let path = encode_path_leaf(path, false);
    let child_len = if child.len() < EMBED_THRESHOLD { child.len() } else { HASHED_REF_LEN };

    let payload_len = string_len(path.as_slice()) + child_len;
    let mut out = vec![0; list_prefix_len(payload_len) + payload_len];
    let pos = write_list_prefix(&mut out, 0, payload_len);
    let pos = write_string(&mut out, pos, path.as_slice());
    out.truncate(pos);
    push_child_ref(&mut out, child);
    debug_assert_eq!(out.len(), list_prefix_len(payload_len) + payload_len);
    out
}

/// Appends the reference a parent holds to `child`: the child itself if it is short enough to be
/// embedded, its hash otherwise.
fn push_child_ref(out: &mut Vec<u8>, child: &[u8]) {
    if child.len() < EMBED_THRESHOLD {
        out.extend_from_slice(child);
    } else {
        let mut hashed = [0u8; HASHED_REF_LEN];
        write_string(&mut hashed, 0, keccak256(child).as_slice());
        out.extend_from_slice(&hashed);
    }
}
