//! Structural comparison of two witnesses.

use crate::{Opcode, Operand, Witness};
use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use alloy_primitives::hex;
use core::fmt;

/// A single difference between two witnesses.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Divergence {
    /// The headers carry different versions.
    Version {
        /// The version of the left witness.
        left: u8,
        /// The version of the right witness.
        right: u8,
    },
    /// The witnesses hold different numbers of operands.
    OperandCount {
        /// The operand count of the left witness.
        left: usize,
        /// The operand count of the right witness.
        right: usize,
    },
    /// The operands at `index` are of different kinds.
    Variant {
        /// The position of the operands.
        index: usize,
        /// The kind of the left operand.
        left: Opcode,
        /// The kind of the right operand.
        right: Opcode,
    },
    /// The operands at `index` are of the same kind and disagree on `field`.
    Field {
        /// The position of the operands.
        index: usize,
        /// The name of the differing field.
        field: &'static str,
        /// The rendered value on the left.
        left: String,
        /// The rendered value on the right.
        right: String,
    },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version { left, right } => write!(f, "version: {left} != {right}"),
            Self::OperandCount { left, right } => write!(f, "operand count: {left} != {right}"),
            Self::Variant { index, left, right } => write!(f, "operand {index}: {left} != {right}"),
            Self::Field { index, field, left, right } => {
                write!(f, "operand {index}.{field}: {left} != {right}")
            }
        }
    }
}

/// Collects the field divergences of one operand pair.
struct FieldDiffs<'a> {
    index: usize,
    out: &'a mut Vec<Divergence>,
}

impl FieldDiffs<'_> {
    fn check<T: PartialEq + ?Sized>(
        &mut self,
        field: &'static str,
        left: &T,
        right: &T,
        render: impl Fn(&T) -> String,
    ) {
        if left != right {
            self.out.push(Divergence::Field {
                index: self.index,
                field,
                left: render(left),
                right: render(right),
            });
        }
    }

    fn bytes(&mut self, field: &'static str, left: &[u8], right: &[u8]) {
        self.check(field, left, right, |bytes: &[u8]| hex::encode_prefixed(bytes));
    }

    fn display<T: PartialEq + ToString>(&mut self, field: &'static str, left: &T, right: &T) {
        self.check(field, left, right, T::to_string);
    }
}

impl Witness {
    /// Returns every divergence between `self` and `other`. An empty result means the two are
    /// equal.
    ///
    /// Operands are compared pairwise over the indices both witnesses have; a difference in
    /// length is reported once as [Divergence::OperandCount].
    pub fn diff(&self, other: &Self) -> Vec<Divergence> {
        let mut out = Vec::new();
        if self.header.version != other.header.version {
            out.push(Divergence::Version {
                left: self.header.version,
                right: other.header.version,
            });
        }
        if self.operands.len() != other.operands.len() {
            out.push(Divergence::OperandCount {
                left: self.operands.len(),
                right: other.operands.len(),
            });
        }
        for (index, (left, right)) in self.operands.iter().zip(&other.operands).enumerate() {
            diff_operands(index, left, right, &mut out);
        }
        out
    }

    /// Writes every divergence between `self` and `other` to `out`, one per line.
    pub fn write_diff<W: fmt::Write>(&self, other: &Self, out: &mut W) -> fmt::Result {
        for divergence in self.diff(other) {
            writeln!(out, "{divergence}")?;
        }
        Ok(())
    }
}

fn diff_operands(index: usize, left: &Operand, right: &Operand, out: &mut Vec<Divergence>) {
    let mut fields = FieldDiffs { index, out };
    match (left, right) {
        (Operand::Hash(a), Operand::Hash(b)) => fields.bytes("hash", a.as_slice(), b.as_slice()),
        (
            Operand::LeafValue { key: key_a, value: value_a },
            Operand::LeafValue { key: key_b, value: value_b },
        ) => {
            fields.bytes("key", key_a, key_b);
            fields.bytes("value", value_a, value_b);
        }
        (
            Operand::LeafAccount {
                key: key_a,
                nonce: nonce_a,
                balance: balance_a,
                has_code: code_a,
                has_storage: storage_a,
            },
            Operand::LeafAccount {
                key: key_b,
                nonce: nonce_b,
                balance: balance_b,
                has_code: code_b,
                has_storage: storage_b,
            },
        ) => {
            fields.bytes("key", key_a, key_b);
            fields.display("nonce", nonce_a, nonce_b);
            fields.display("balance", balance_a, balance_b);
            fields.display("has_code", code_a, code_b);
            fields.display("has_storage", storage_a, storage_b);
        }
        (Operand::Code(a), Operand::Code(b)) => fields.bytes("code", a, b),
        (Operand::Branch { mask: a }, Operand::Branch { mask: b }) => {
            fields.check("mask", a, b, |mask| format!("{:#018b}", mask.get()));
        }
        (Operand::EmptyRoot, Operand::EmptyRoot) => {}
        (Operand::Extension { key: a }, Operand::Extension { key: b }) => {
            fields.bytes("key", a, b)
        }
        _ => fields.out.push(Divergence::Variant {
            index,
            left: left.opcode(),
            right: right.opcode(),
        }),
    }
}
