//! Ordered collections whose items are committed to by an index-keyed trie.

use alloc::{borrow::Cow, vec::Vec};
use alloy_rlp::Encodable;
use derive_more::From;

/// An ordered collection of pre-encoded items, such as the transactions or receipts of a block.
///
/// The item stored at position `i` is committed to under the key `rlp(i)`.
pub trait DerivableList {
    /// Returns the number of items in the collection.
    fn len(&self) -> usize;

    /// Returns `true` if the collection holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the encoded bytes of the item at `index`. `index` is always below [Self::len].
    fn get_raw(&self, index: usize) -> Cow<'_, [u8]>;
}

impl<T: AsRef<[u8]>> DerivableList for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get_raw(&self, index: usize) -> Cow<'_, [u8]> {
        Cow::Borrowed(self[index].as_ref())
    }
}

impl<T: AsRef<[u8]>> DerivableList for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get_raw(&self, index: usize) -> Cow<'_, [u8]> {
        self.as_slice().get_raw(index)
    }
}

/// A [DerivableList] over typed items, each RLP encoded on access.
#[derive(Debug, From)]
pub struct Encoded<'a, T>(&'a [T]);

impl<'a, T> Encoded<'a, T> {
    /// Wraps a slice of encodable items.
    pub const fn new(items: &'a [T]) -> Self {
        Self(items)
    }
}

impl<T: Encodable> DerivableList for Encoded<'_, T> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get_raw(&self, index: usize) -> Cow<'_, [u8]> {
        Cow::Owned(alloy_rlp::encode(&self.0[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloy_primitives::Bytes;

    #[test]
    fn test_slice_list() {
        let items = vec![Bytes::from_static(b"\x01"), Bytes::from_static(b"\xc2\x80\x80")];
        assert_eq!(DerivableList::len(&items), 2);
        assert!(!DerivableList::is_empty(&items));
        assert_eq!(&*items.get_raw(1), b"\xc2\x80\x80".as_slice());

        let empty: &[Bytes] = &[];
        assert!(DerivableList::is_empty(empty));
    }

    #[test]
    fn test_encoded_list() {
        let items = [0u64, 1, 1024];
        let list = Encoded::from(items.as_slice());
        assert_eq!(list.len(), 3);
        assert_eq!(&*list.get_raw(0), [0x80].as_slice());
        assert_eq!(&*list.get_raw(1), [0x01].as_slice());
        assert_eq!(&*list.get_raw(2), [0x82, 0x04, 0x00].as_slice());
    }
}
