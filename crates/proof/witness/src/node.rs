//! This module contains the [TrieNode] type, an explicit in-memory Merkle Patricia Trie that is
//! built in full and hashed afterwards. It is the reference the streamed root in
//! [crate::derive_root] is checked against.

use crate::{DerivableList, TrieNodeError, errors::TrieNodeResult};
use alloc::{boxed::Box, vec::Vec};
use alloy_primitives::{B256, Bytes, keccak256};
use alloy_rlp::{BufMut, EMPTY_STRING_CODE, Encodable, Header};
use alloy_trie::{EMPTY_ROOT_HASH, Nibbles, nodes::encode_path_leaf};

/// The number of children of a branch node.
const BRANCH_WIDTH: usize = 16;

/// Child encodings of at least this length are referenced by hash.
const HASH_REFERENCE_THRESHOLD: usize = B256::len_bytes();

/// A node of an in-memory Merkle Patricia Trie.
///
/// - [TrieNode::Leaf] encodes as `rlp([compact(path, leaf), value])`.
/// - [TrieNode::Extension] encodes as `rlp([compact(path, extension), child])`.
/// - [TrieNode::Branch] encodes as `rlp([child_0, ..., child_15, ""])`.
///
/// A child is embedded in its parent when its encoding is shorter than 32 bytes, and replaced by
/// its [keccak256] hash otherwise.
///
/// Branches carry no value, so every key inserted into the trie must be prefix free with respect
/// to the others. Index keys `rlp(i)` are.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum TrieNode {
    /// An empty subtrie, encoded as [EMPTY_STRING_CODE].
    #[default]
    Empty,
    /// A leaf holding the rest of a key and its value.
    Leaf {
        /// The remaining path of the key.
        prefix: Nibbles,
        /// The stored value.
        value: Bytes,
    },
    /// A path shared by every key below `node`.
    Extension {
        /// The shared path.
        prefix: Nibbles,
        /// The node the path leads to. Always a branch.
        node: Box<TrieNode>,
    },
    /// A fork on the next nibble of the key.
    Branch {
        /// The children, indexed by nibble.
        children: Box<[TrieNode; BRANCH_WIDTH]>,
    },
}

/// Builds the full trie for `list` keyed by `rlp(i)`, and returns its root hash.
pub fn derive_root_materialized<L: DerivableList + ?Sized>(list: &L) -> TrieNodeResult<B256> {
    Ok(TrieNode::ordered(list)?.blind())
}

impl TrieNode {
    /// Builds the trie holding `get_raw(i)` under `rlp(i)` for every item of `list`. Items are
    /// inserted in index order, not key order.
    pub fn ordered<L: DerivableList + ?Sized>(list: &L) -> TrieNodeResult<Self> {
        Self::from_indexed(list.len(), |i| Bytes::copy_from_slice(&list.get_raw(i)))
    }

    /// Builds the trie holding `rlp(get_raw(i))` under `rlp(i)` for every item of `list`.
    pub fn ordered_values<L: DerivableList + ?Sized>(list: &L) -> TrieNodeResult<Self> {
        Self::from_indexed(list.len(), |i| alloy_rlp::encode(&*list.get_raw(i)).into())
    }

    fn from_indexed(len: usize, mut value: impl FnMut(usize) -> Bytes) -> TrieNodeResult<Self> {
        let mut root = Self::Empty;
        let mut key = Vec::with_capacity(9);
        for i in 0..len {
            key.clear();
            i.encode(&mut key);
            root.insert(&Nibbles::unpack(&key), value(i))?;
        }
        Ok(root)
    }

    /// Returns the commitment to the trie rooted at this node: [EMPTY_ROOT_HASH] when empty, the
    /// [keccak256] hash of the encoding otherwise, however short it is.
    pub fn blind(&self) -> B256 {
        match self {
            Self::Empty => EMPTY_ROOT_HASH,
            _ => keccak256(alloy_rlp::encode(self)),
        }
    }

    /// Stores `value` under `path`, replacing the value of an existing leaf with the same path.
    ///
    /// ## Returns
    /// - `Err(TrieNodeError::PathTooShort)` - `path` is a strict prefix of a stored key, or the
    ///   other way around. The trie is left unchanged.
    /// - `Ok(())` - The value was stored.
    pub fn insert(&mut self, path: &Nibbles, value: Bytes) -> TrieNodeResult<()> {
        match self {
            Self::Empty => {
                *self = Self::Leaf { prefix: *path, value };
            }
            Self::Leaf { prefix, value: existing } if *prefix == *path => {
                *existing = value;
            }
            Self::Leaf { prefix, value: existing } => {
                let shared = prefix.common_prefix_length(path);
                let old = fork_nibble(prefix, shared)?;
                let new = fork_nibble(path, shared)?;
                let moved = Self::Leaf {
                    prefix: prefix.slice(shared + 1..),
                    value: core::mem::take(existing),
                };
                *self = fork(path, shared, (old, moved), (new, value));
            }
            Self::Extension { prefix, node } => {
                let shared = prefix.common_prefix_length(path);
                if shared == prefix.len() {
                    return node.insert(&path.slice(shared..), value);
                }

                let old = fork_nibble(prefix, shared)?;
                let new = fork_nibble(path, shared)?;
                let rest = prefix.slice(shared + 1..);
                let child = core::mem::take(&mut **node);
                let moved = if rest.is_empty() {
                    child
                } else {
                    Self::Extension { prefix: rest, node: Box::new(child) }
                };
                *self = fork(path, shared, (old, moved), (new, value));
            }
            Self::Branch { children } => {
                let nibble = fork_nibble(path, 0)?;
                children[nibble].insert(&path.slice(1..), value)?;
            }
        }
        Ok(())
    }

    fn payload_length(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Leaf { prefix, value } => {
                encode_path_leaf(prefix, true).as_slice().length() + value.length()
            }
            Self::Extension { prefix, node } => {
                encode_path_leaf(prefix, false).as_slice().length() + node.reference_length()
            }
            // The trailing value slot is always the empty string.
            Self::Branch { children } => {
                children.iter().map(Self::reference_length).sum::<usize>() + 1
            }
        }
    }

    /// The length of the reference a parent holds to this node.
    fn reference_length(&self) -> usize {
        let len = self.length();
        if len < HASH_REFERENCE_THRESHOLD { len } else { B256::ZERO.length() }
    }

    fn encode_reference(&self, out: &mut dyn BufMut) {
        if self.length() < HASH_REFERENCE_THRESHOLD {
            self.encode(out);
        } else {
            keccak256(alloy_rlp::encode(self)).encode(out);
        }
    }
}

/// Returns the nibble of `path` at `depth` where two keys part.
fn fork_nibble(path: &Nibbles, depth: usize) -> TrieNodeResult<usize> {
    path.get(depth).map(usize::from).ok_or(TrieNodeError::PathTooShort)
}

/// Builds the branch that parts an existing subtrie from a new leaf after `shared` nibbles of
/// `path`, behind an extension when `shared` is not empty.
fn fork(
    path: &Nibbles,
    shared: usize,
    (old, moved): (usize, TrieNode),
    (new, value): (usize, Bytes),
) -> TrieNode {
    let mut children: Box<[TrieNode; BRANCH_WIDTH]> = Box::default();
    children[old] = moved;
    children[new] = TrieNode::Leaf { prefix: path.slice(shared + 1..), value };

    let branch = TrieNode::Branch { children };
    if shared == 0 {
        branch
    } else {
        TrieNode::Extension { prefix: path.slice(..shared), node: Box::new(branch) }
    }
}

impl Encodable for TrieNode {
    fn encode(&self, out: &mut dyn BufMut) {
        let header = Header { list: true, payload_length: self.payload_length() };
        match self {
            Self::Empty => out.put_u8(EMPTY_STRING_CODE),
            Self::Leaf { prefix, value } => {
                header.encode(out);
                encode_path_leaf(prefix, true).as_slice().encode(out);
                value.encode(out);
            }
            Self::Extension { prefix, node } => {
                header.encode(out);
                encode_path_leaf(prefix, false).as_slice().encode(out);
                node.encode_reference(out);
            }
            Self::Branch { children } => {
                header.encode(out);
                for child in children.iter() {
                    child.encode_reference(out);
                }
                out.put_u8(EMPTY_STRING_CODE);
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            Self::Empty => 1,
            _ => {
                let payload_length = self.payload_length();
                Header { list: true, payload_length }.length() + payload_length
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{bytes, hex};
    use alloy_trie::HashBuilder;

    fn branch(entries: impl IntoIterator<Item = (usize, TrieNode)>) -> TrieNode {
        let mut children: Box<[TrieNode; BRANCH_WIDTH]> = Box::default();
        for (nibble, child) in entries {
            children[nibble] = child;
        }
        TrieNode::Branch { children }
    }

    fn leaf(nibbles: &[u8], value: Bytes) -> TrieNode {
        TrieNode::Leaf { prefix: Nibbles::from_nibbles(nibbles), value }
    }

    #[test]
    fn test_empty_commitment() {
        assert_eq!(TrieNode::Empty.blind(), EMPTY_ROOT_HASH);
        assert_eq!(alloy_rlp::encode(TrieNode::Empty), [EMPTY_STRING_CODE]);
    }

    #[test]
    fn test_encode_leaf() {
        // An even leaf path `do` and a five byte value.
        let node = TrieNode::Leaf { prefix: Nibbles::unpack(b"do"), value: bytes!("76657262ff") };
        let expected = hex!("ca8320646f8576657262ff");
        assert_eq!(node.length(), expected.len());
        assert_eq!(alloy_rlp::encode(&node), expected);
    }

    #[test]
    fn test_encode_branch_embeds_short_children() {
        let node = branch([(1, leaf(&[], bytes!("01"))), (15, leaf(&[0xa], bytes!("02")))]);
        let expected = hex!("d580" "c22001" "80808080808080808080808080" "c23a02" "80");
        assert_eq!(node.length(), expected.len());
        assert_eq!(alloy_rlp::encode(&node), expected);
    }

    #[test]
    fn test_encode_extension_hashes_long_child() {
        let child = branch([(0, leaf(&[], [0xff; 40].into())), (1, leaf(&[], bytes!("01")))]);
        let child_rlp = alloy_rlp::encode(&child);
        assert!(child_rlp.len() >= HASH_REFERENCE_THRESHOLD);

        let node =
            TrieNode::Extension { prefix: Nibbles::from_nibbles([0x8]), node: Box::new(child) };
        let mut expected = hex!("e2" "18" "a0").to_vec();
        expected.extend_from_slice(keccak256(&child_rlp).as_slice());
        assert_eq!(node.length(), expected.len());
        assert_eq!(alloy_rlp::encode(&node), expected);
    }

    #[test]
    fn test_insert_forks_leaf() {
        let mut node = TrieNode::Empty;
        node.insert(&Nibbles::unpack(hex!("012345")), bytes!("01")).unwrap();
        node.insert(&Nibbles::unpack(hex!("012346")), bytes!("02")).unwrap();

        let expected = TrieNode::Extension {
            prefix: Nibbles::from_nibbles([0, 1, 2, 3, 4]),
            node: Box::new(branch([(5, leaf(&[], bytes!("01"))), (6, leaf(&[], bytes!("02")))])),
        };
        assert_eq!(node, expected);
    }

    #[test]
    fn test_insert_forks_extension() {
        let mut node = TrieNode::Empty;
        node.insert(&Nibbles::unpack(hex!("012345")), bytes!("01")).unwrap();
        node.insert(&Nibbles::unpack(hex!("012346")), bytes!("02")).unwrap();
        node.insert(&Nibbles::unpack(hex!("01ff00")), bytes!("03")).unwrap();

        let TrieNode::Extension { prefix, node: below } = &node else {
            panic!("Expected Extension at the root");
        };
        assert_eq!(*prefix, Nibbles::from_nibbles([0, 1]));
        let TrieNode::Branch { children } = below.as_ref() else {
            panic!("Expected Branch below the extension");
        };
        // `2345` and `2346` keep the `34` of the old extension.
        assert!(matches!(&children[2], TrieNode::Extension { prefix, .. } if prefix.len() == 2));
        assert_eq!(children[0xf], leaf(&[0xf, 0x0, 0x0], bytes!("03")));
    }

    #[test]
    fn test_insert_forks_extension_at_last_nibble() {
        let mut node = TrieNode::Empty;
        node.insert(&Nibbles::unpack(hex!("1234")), bytes!("01")).unwrap();
        node.insert(&Nibbles::unpack(hex!("1235")), bytes!("02")).unwrap();
        node.insert(&Nibbles::unpack(hex!("1244")), bytes!("03")).unwrap();

        // The extension `123` parts at its last nibble, so the old branch hangs directly below.
        let TrieNode::Extension { prefix, node: below } = &node else {
            panic!("Expected Extension at the root");
        };
        assert_eq!(*prefix, Nibbles::from_nibbles([1, 2]));
        let TrieNode::Branch { children } = below.as_ref() else {
            panic!("Expected Branch below the extension");
        };
        assert!(matches!(children[3], TrieNode::Branch { .. }));
        assert_eq!(children[4], leaf(&[0x4], bytes!("03")));
    }

    #[test]
    fn test_insert_replaces_value() {
        let mut node = TrieNode::Empty;
        let path = Nibbles::unpack(hex!("80"));
        node.insert(&path, bytes!("01")).unwrap();
        node.insert(&path, bytes!("02")).unwrap();
        assert_eq!(node, TrieNode::Leaf { prefix: path, value: bytes!("02") });
    }

    #[test]
    fn test_insert_prefix_key() {
        let mut node = TrieNode::Empty;
        node.insert(&Nibbles::unpack(hex!("0102")), bytes!("01")).unwrap();
        let before = node.clone();

        assert_eq!(
            node.insert(&Nibbles::unpack(hex!("01")), bytes!("02")),
            Err(TrieNodeError::PathTooShort)
        );
        assert_eq!(node, before);
    }

    #[test]
    fn test_ordered_values() {
        let values = [bytes!("01"), bytes!("ff"), Bytes::new()];
        let encoded = values.iter().map(alloy_rlp::encode).collect::<Vec<_>>();
        assert_eq!(
            TrieNode::ordered_values(&values[..]).unwrap(),
            TrieNode::ordered(&encoded).unwrap()
        );
    }

    proptest::proptest! {
        /// Differential test of the commitment against a `HashBuilder` fed the same keys.
        #[test]
        fn diff_hash_builder(mut keys in proptest::collection::vec(proptest::prelude::any::<[u8; 32]>(), 1..2048)) {
            keys.sort();
            keys.dedup();

            let mut hb = HashBuilder::default();
            let mut node = TrieNode::Empty;
            for key in &keys {
                hb.add_leaf(Nibbles::unpack(key), key);
            }
            // The in-memory trie does not depend on insertion order.
            for key in keys.iter().rev() {
                node.insert(&Nibbles::unpack(key), Bytes::copy_from_slice(key)).unwrap();
            }

            proptest::prop_assert_eq!(node.blind(), hb.root());
        }
    }
}
