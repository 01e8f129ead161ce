#![doc = include_str!("../README.md")]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/op-rs/kona/main/assets/square.png",
    html_favicon_url = "https://raw.githubusercontent.com/op-rs/kona/main/assets/favicon.ico",
    issue_tracker_base_url = "https://github.com/op-rs/kona/issues/"
)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), no_std)]

extern crate alloc;

mod errors;
pub use errors::{OperandError, TrieNodeError, TrieNodeResult, WitnessError, WitnessResult};

pub mod length;

mod list;
pub use list::{DerivableList, Encoded};

mod hasher;
pub use hasher::{EMBED_THRESHOLD, derive_root, derive_root_of_values};

mod node;
pub use node::{TrieNode, derive_root_materialized};

mod util;
pub use util::ordered_trie_root;

mod stats;
pub use stats::{StatsColumn, WitnessStats};

mod witness;
pub use witness::{
    DEFAULT_MAX_FIELD_LENGTH, DecodeLimits, Opcode, Operand, WITNESS_VERSION, Witness,
    WitnessHeader,
};

mod diff;
pub use diff::Divergence;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_util;
