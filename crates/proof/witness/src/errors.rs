//! Errors for the `kona-witness` crate.

use alloy_rlp::Error as RlpError;
use thiserror::Error;

/// A [Result] type alias where the error is [TrieNodeError].
pub type TrieNodeResult<T> = Result<T, TrieNodeError>;

/// An error type for [TrieNode] operations.
///
/// [TrieNode]: crate::TrieNode
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrieNodeError {
    /// The path ran out of nibbles before reaching a leaf.
    #[error("Path too short")]
    PathTooShort,
}

/// A [Result] type alias where the error is [WitnessError].
pub type WitnessResult<T> = Result<T, WitnessError>;

/// An error returned while decoding a [Witness]. Any error aborts the whole decode.
///
/// [Witness]: crate::Witness
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessError {
    /// The input ended before the version byte.
    #[error("Witness is missing its header")]
    MissingHeader,
    /// The stored version is not the one this reader supports.
    #[error("Unexpected witness version: expected {expected}, got {got}")]
    VersionMismatch {
        /// The supported version.
        expected: u8,
        /// The version found in the stream.
        got: u8,
    },
    /// The stream holds more operands than the configured limit.
    #[error("Witness exceeds the limit of {max} operands")]
    TooManyOperands {
        /// The configured limit.
        max: usize,
    },
    /// An operand could not be decoded.
    #[error("Malformed operand {index} at byte {offset}: {source}")]
    Operand {
        /// The position of the operand in the sequence.
        index: usize,
        /// The offset of the operand's opcode from the start of the stream.
        offset: usize,
        /// The underlying failure.
        source: OperandError,
    },
}

/// An error in the body of a single operand.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperandError {
    /// The opcode byte is not part of the closed enumeration.
    #[error("Unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    /// The input ended inside the named field.
    #[error("Truncated {0}")]
    Truncated(&'static str),
    /// A length prefix declared more bytes than the decoder accepts.
    #[error("{field} of {len} bytes exceeds the {max} byte limit")]
    FieldTooLong {
        /// The field being decoded.
        field: &'static str,
        /// The declared length.
        len: usize,
        /// The configured limit.
        max: usize,
    },
    /// A string field was encoded as an RLP list.
    #[error("Expected {0} to be a string, found a list")]
    UnexpectedList(&'static str),
    /// The account flags byte has bits outside of `has_code` and `has_storage`.
    #[error("Undefined account flag bits in {0:#04x}")]
    InvalidFlags(u8),
    /// The field is not canonically RLP encoded.
    #[error("Invalid {field}: {error}")]
    Rlp {
        /// The field being decoded.
        field: &'static str,
        /// The RLP error.
        error: RlpError,
    },
}

impl OperandError {
    /// Classifies an RLP error raised while decoding `field`. Running out of input is a
    /// truncation, everything else is a malformed encoding.
    pub(crate) const fn rlp(field: &'static str, error: RlpError) -> Self {
        match error {
            RlpError::InputTooShort => Self::Truncated(field),
            error => Self::Rlp { field, error },
        }
    }
}
