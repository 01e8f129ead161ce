//! Utilities for `kona-witness`

use crate::DerivableList;
use alloc::vec::Vec;
use alloy_primitives::B256;
use alloy_rlp::Encodable;
use alloy_trie::{HashBuilder, Nibbles};

/// Computes the root of the trie holding `get_raw(i)` under `rlp(i)` for every item of `list` by
/// feeding the keys to a [HashBuilder] in sorted order.
///
/// This commits to the same root as [crate::derive_root] through unrelated code.
pub fn ordered_trie_root<L: DerivableList + ?Sized>(list: &L) -> B256 {
    let len = list.len();
    let mut hb = HashBuilder::default();
    let mut key = Vec::with_capacity(9);
    for position in 0..len {
        let index = adjust_index_for_rlp(position, len);
        key.clear();
        index.encode(&mut key);
        hb.add_leaf(Nibbles::unpack(&key), &list.get_raw(index));
    }
    hb.root()
}

/// Maps a position in the sorted order of the keys `rlp(0), .., rlp(len - 1)` to the index whose
/// key sits there.
///
/// `rlp(0) = 0x80` sorts after the single byte keys `0x01..=0x7f`, and before every multi-byte
/// key, so index zero is visited at position `0x7f`, or last if the list is shorter than that.
pub(crate) const fn adjust_index_for_rlp(position: usize, len: usize) -> usize {
    match position {
        0x80.. => position,
        0x7f => 0,
        _ if position + 1 == len => 0,
        _ => position + 1,
    }
}
