//! Testing utilities for `kona-witness`

use crate::{Operand, Witness};
use alloc::{format, vec, vec::Vec};
use alloy_primitives::{Address, B256, Bytes, U256, b256};
use alloy_rlp::RlpEncodable;
use alloy_trie::TrieMask;

/// A legacy-shaped transaction with deterministic fields, used to build list roots of any size.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable)]
pub struct TestTransaction {
    /// The nonce, equal to the index of the transaction.
    pub nonce: u64,
    /// The gas price.
    pub gas_price: u64,
    /// The gas limit.
    pub gas_limit: u64,
    /// The recipient.
    pub to: Address,
    /// The transferred value.
    pub value: u64,
    /// The call data.
    pub input: Bytes,
    /// Signature `v`.
    pub v: u64,
    /// Signature `r`.
    pub r: u64,
    /// Signature `s`.
    pub s: u64,
}

impl TestTransaction {
    /// Returns the `index`th transaction of the fixture.
    pub fn new(index: u64) -> Self {
        Self {
            nonce: index,
            gas_price: 1000 + index,
            gas_limit: 10 + index,
            to: Address::ZERO,
            value: 1000 + index,
            input: Bytes::from(format!("hello{index}").into_bytes()),
            v: 0,
            r: 0,
            s: 0,
        }
    }
}

/// Returns the first `n` transactions of the fixture.
pub fn transactions(n: u64) -> Vec<TestTransaction> {
    (0..n).map(TestTransaction::new).collect()
}

/// Returns the RLP encodings of the first `n` transactions of the fixture.
pub fn encoded_transactions(n: u64) -> Vec<Bytes> {
    (0..n).map(|index| alloy_rlp::encode(TestTransaction::new(index)).into()).collect()
}

/// Known roots of the first `n` transactions of the fixture.
pub fn transaction_root_vectors() -> Vec<(u64, B256)> {
    vec![
        (0, b256!("0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421")),
        (1, b256!("0x1b18d86a2d8b21c60cdd147160af5bf2500cd822b93e3c0dc5ed3801b9721c62")),
        (2, b256!("0xa11afe4b9db3814f46efc1bff52dc0643f536d2ae3aedc01c3381fe48e2a3665")),
        (4, b256!("0xff19377cf77f25caa88628861212c455d134876cad344d27c9cd49e1ba73eb77")),
        (10, b256!("0x48ebdecfd8da114d2a7997a6956d531e812f8f2b0f59726807f6eb5d542f2242")),
        (100, b256!("0xb527630238d74db8346725270bd7a06abfed8eb867ee22ef55f1c4a6ae325338")),
        (1000, b256!("0xfac5325c99717fb1b03007121d05d7cf7a7629cf814b9c4d99180b0f9104c0ee")),
        (10000, b256!("0x87f89cf66cd7a5a191947bd2ad515f28e95b5370e20bdec7886314253feb2892")),
        (100000, b256!("0xffcb005d4cf0ff66a9549eb69f9501e021ec43ea309ba4a47c1a2f15a91879cf")),
    ]
}

/// Returns a witness holding every kind of operand exactly once, with a branch mask, a code field
/// longer than 55 bytes and a balance that needs all 32 bytes.
pub fn sample_witness() -> Witness {
    Witness::new(vec![
        Operand::Branch { mask: TrieMask::new(0b0000_0100_0010_0001) },
        Operand::Extension { key: Bytes::from_static(&[0x00, 0x12]) },
        Operand::LeafValue {
            key: Bytes::from_static(&[0x20, 0x01]),
            value: Bytes::from_static(&[0x7f]),
        },
        Operand::LeafAccount {
            key: Bytes::from(vec![0x3a; 32]),
            nonce: u64::MAX,
            balance: U256::MAX,
            has_code: true,
            has_storage: true,
        },
        Operand::Code(Bytes::from(vec![0x60; 120])),
        Operand::Hash(b256!("0xabababababababababababababababababababababababababababababababab")),
        Operand::EmptyRoot,
    ])
}
