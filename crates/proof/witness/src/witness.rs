//! The binary block witness format.
//!
//! A witness is a version byte followed by a stream of operands that describe a partial trie in
//! the order of a depth-first walk. Every operand starts with its [Opcode]; there is no operand
//! count, the stream ends with the input.
//!
//! ```text
//! witness     := version:u8 operand*
//! Hash        := 0x03 digest:32
//! LeafValue   := 0x00 key:rlp value:rlp
//! LeafAccount := 0x05 key:rlp nonce:u64be balance:rlp(u256) flags:u8
//! Code        := 0x04 code:rlp
//! Branch      := 0x02 mask:u16be
//! EmptyRoot   := 0x06
//! Extension   := 0x01 key:rlp
//! ```

use crate::{
    OperandError, WitnessError,
    errors::WitnessResult,
    length::{LONG_STRING_OFFSET, MAX_SHORT_PAYLOAD},
    stats::{StatsColumn, StatsWriter, WitnessStats},
};
use alloc::vec::Vec;
use alloy_primitives::{B256, Bytes, U256};
use alloy_rlp::{Buf, BufMut, Decodable, EMPTY_STRING_CODE, Encodable, Error as RlpError};
use alloy_trie::TrieMask;
use core::fmt;
use tracing::{debug, trace};

/// The version of the witness format written and accepted by this crate. Any change to the
/// opcode set or to an operand layout requires a new version.
pub const WITNESS_VERSION: u8 = 1;

/// The default upper bound on a single length-prefixed field, 16 MiB.
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 1 << 24;

/// Bit of the account flags byte set when the account has code.
const FLAG_HAS_CODE: u8 = 0b01;

/// Bit of the account flags byte set when the account has storage.
const FLAG_HAS_STORAGE: u8 = 0b10;

/// The tag identifying the operand that follows in a witness stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// [Operand::LeafValue]
    LeafValue = 0x00,
    /// [Operand::Extension]
    Extension = 0x01,
    /// [Operand::Branch]
    Branch = 0x02,
    /// [Operand::Hash]
    Hash = 0x03,
    /// [Operand::Code]
    Code = 0x04,
    /// [Operand::LeafAccount]
    LeafAccount = 0x05,
    /// [Operand::EmptyRoot]
    EmptyRoot = 0x06,
}

impl TryFrom<u8> for Opcode {
    type Error = OperandError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x00 => Self::LeafValue,
            0x01 => Self::Extension,
            0x02 => Self::Branch,
            0x03 => Self::Hash,
            0x04 => Self::Code,
            0x05 => Self::LeafAccount,
            0x06 => Self::EmptyRoot,
            _ => return Err(OperandError::UnknownOpcode(byte)),
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LeafValue => "LeafValue",
            Self::Extension => "Extension",
            Self::Branch => "Branch",
            Self::Hash => "Hash",
            Self::Code => "Code",
            Self::LeafAccount => "LeafAccount",
            Self::EmptyRoot => "EmptyRoot",
        };
        f.write_str(name)
    }
}

/// A single instruction of a witness.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Operand {
    /// A subtrie that is only known by its hash.
    Hash(B256),
    /// A storage leaf.
    LeafValue {
        /// The remaining key of the leaf.
        key: Bytes,
        /// The stored value.
        value: Bytes,
    },
    /// An account leaf.
    LeafAccount {
        /// The remaining key of the leaf.
        key: Bytes,
        /// The account nonce.
        nonce: u64,
        /// The account balance.
        balance: U256,
        /// Whether a [Operand::Code] for the account follows.
        has_code: bool,
        /// Whether the account's storage trie follows.
        has_storage: bool,
    },
    /// Contract bytecode.
    Code(Bytes),
    /// A branch node; each set bit of the mask is a present child.
    Branch {
        /// The child presence mask.
        mask: TrieMask,
    },
    /// The root of an empty trie.
    EmptyRoot,
    /// An extension node.
    Extension {
        /// The shared key of the extension.
        key: Bytes,
    },
}

impl Operand {
    /// Returns the [Opcode] tagging this operand.
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Hash(_) => Opcode::Hash,
            Self::LeafValue { .. } => Opcode::LeafValue,
            Self::LeafAccount { .. } => Opcode::LeafAccount,
            Self::Code(_) => Opcode::Code,
            Self::Branch { .. } => Opcode::Branch,
            Self::EmptyRoot => Opcode::EmptyRoot,
            Self::Extension { .. } => Opcode::Extension,
        }
    }

    /// Returns the serialized length of the operand, opcode included.
    pub fn length(&self) -> usize {
        1 + match self {
            Self::Hash(_) => B256::len_bytes(),
            Self::LeafValue { key, value } => key.length() + value.length(),
            Self::LeafAccount { key, balance, .. } => {
                key.length() + size_of::<u64>() + balance.length() + 1
            }
            Self::Code(code) => code.length(),
            Self::Branch { .. } => size_of::<u16>(),
            Self::EmptyRoot => 0,
            Self::Extension { key } => key.length(),
        }
    }

    fn write_to(&self, out: &mut StatsWriter<'_>) {
        out.put_u8(StatsColumn::Structure, self.opcode() as u8);
        match self {
            Self::Hash(hash) => out.put_slice(StatsColumn::Hashes, hash.as_slice()),
            Self::LeafValue { key, value } => {
                out.put_rlp(StatsColumn::LeafKeys, key);
                out.put_rlp(StatsColumn::LeafValues, value);
            }
            Self::LeafAccount { key, nonce, balance, has_code, has_storage } => {
                out.put_rlp(StatsColumn::LeafKeys, key);
                out.put_slice(StatsColumn::LeafValues, &nonce.to_be_bytes());
                out.put_rlp(StatsColumn::LeafValues, balance);
                let mut flags = 0;
                if *has_code {
                    flags |= FLAG_HAS_CODE;
                }
                if *has_storage {
                    flags |= FLAG_HAS_STORAGE;
                }
                out.put_u8(StatsColumn::Structure, flags);
            }
            Self::Code(code) => out.put_rlp(StatsColumn::Codes, code),
            Self::Branch { mask } => {
                out.put_slice(StatsColumn::Structure, &mask.get().to_be_bytes())
            }
            Self::EmptyRoot => {}
            Self::Extension { key } => out.put_rlp(StatsColumn::LeafKeys, key),
        }
    }

    /// Decodes the fields of an operand whose opcode has already been consumed.
    fn decode_fields(
        opcode: Opcode,
        buf: &mut &[u8],
        limits: &DecodeLimits,
    ) -> Result<Self, OperandError> {
        Ok(match opcode {
            Opcode::Hash => Self::Hash(B256::from(read_array::<32>(buf, "hash")?)),
            Opcode::LeafValue => Self::LeafValue {
                key: read_string(buf, "key", limits)?,
                value: read_string(buf, "value", limits)?,
            },
            Opcode::LeafAccount => {
                let key = read_string(buf, "key", limits)?;
                let nonce = u64::from_be_bytes(read_array(buf, "nonce")?);
                let balance = U256::decode(buf).map_err(|e| OperandError::rlp("balance", e))?;
                let [flags] = read_array::<1>(buf, "flags")?;
                if flags & !(FLAG_HAS_CODE | FLAG_HAS_STORAGE) != 0 {
                    return Err(OperandError::InvalidFlags(flags));
                }
                Self::LeafAccount {
                    key,
                    nonce,
                    balance,
                    has_code: flags & FLAG_HAS_CODE != 0,
                    has_storage: flags & FLAG_HAS_STORAGE != 0,
                }
            }
            Opcode::Code => Self::Code(read_string(buf, "code", limits)?),
            Opcode::Branch => {
                Self::Branch { mask: TrieMask::new(u16::from_be_bytes(read_array(buf, "mask")?)) }
            }
            Opcode::EmptyRoot => Self::EmptyRoot,
            Opcode::Extension => Self::Extension { key: read_string(buf, "key", limits)? },
        })
    }
}

/// Reads a fixed-width field.
fn read_array<const N: usize>(
    buf: &mut &[u8],
    field: &'static str,
) -> Result<[u8; N], OperandError> {
    let (bytes, rest) = buf.split_first_chunk::<N>().ok_or(OperandError::Truncated(field))?;
    *buf = rest;
    Ok(*bytes)
}

/// Reads an RLP string field. The declared length is checked against the limit and the remaining
/// input before anything is allocated.
fn read_string(
    buf: &mut &[u8],
    field: &'static str,
    limits: &DecodeLimits,
) -> Result<Bytes, OperandError> {
    let len = read_string_header(buf, field)?;
    if len > limits.max_field_length {
        return Err(OperandError::FieldTooLong { field, len, max: limits.max_field_length });
    }
    if len > buf.len() {
        return Err(OperandError::Truncated(field));
    }
    let bytes = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(bytes)
}

/// Consumes the string header at the front of `buf` and returns the declared payload length.
///
/// Unlike [alloy_rlp::Header::decode] this does not require the payload to be present yet, so an
/// oversized declaration is reported as such rather than as a truncation.
fn read_string_header(buf: &mut &[u8], field: &'static str) -> Result<usize, OperandError> {
    let (&first, rest) = buf.split_first().ok_or(OperandError::Truncated(field))?;
    match first {
        // A single byte below 0x80 is its own encoding.
        0x00..=0x7F => Ok(1),
        EMPTY_STRING_CODE..=LONG_STRING_OFFSET => {
            *buf = rest;
            let len = (first - EMPTY_STRING_CODE) as usize;
            if len == 1 && rest.first().is_some_and(|byte| *byte < EMPTY_STRING_CODE) {
                return Err(OperandError::rlp(field, RlpError::NonCanonicalSingleByte));
            }
            Ok(len)
        }
        0xB8..=0xBF => {
            let len_of_len = (first - LONG_STRING_OFFSET) as usize;
            if rest.len() < len_of_len {
                return Err(OperandError::Truncated(field));
            }
            let (be, rest) = rest.split_at(len_of_len);
            if be[0] == 0 {
                return Err(OperandError::rlp(field, RlpError::LeadingZero));
            }
            let mut padded = [0u8; 8];
            padded[8 - len_of_len..].copy_from_slice(be);
            let len = usize::try_from(u64::from_be_bytes(padded))
                .map_err(|_| OperandError::rlp(field, RlpError::Overflow))?;
            if len <= MAX_SHORT_PAYLOAD {
                return Err(OperandError::rlp(field, RlpError::NonCanonicalSize));
            }
            *buf = rest;
            Ok(len)
        }
        _ => Err(OperandError::UnexpectedList(field)),
    }
}

/// Bounds applied while decoding untrusted witness streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// The longest accepted key, value or code field.
    pub max_field_length: usize,
    /// The largest accepted number of operands.
    pub max_operands: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self { max_field_length: DEFAULT_MAX_FIELD_LENGTH, max_operands: usize::MAX }
    }
}

/// The header of a witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct WitnessHeader {
    /// The format version.
    pub version: u8,
}

impl Default for WitnessHeader {
    fn default() -> Self {
        Self { version: WITNESS_VERSION }
    }
}

impl WitnessHeader {
    /// Reads the header from the front of `buf`. The version is returned as found.
    pub fn decode(buf: &mut &[u8]) -> WitnessResult<Self> {
        let [version] = read_array::<1>(buf, "version").map_err(|_| WitnessError::MissingHeader)?;
        Ok(Self { version })
    }
}

/// A serialized partial trie: a header and the operands of a trie walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Witness {
    /// The witness header.
    pub header: WitnessHeader,
    /// The operands, in walk order.
    pub operands: Vec<Operand>,
}

impl Witness {
    /// Creates a witness of the current [WITNESS_VERSION].
    pub fn new(operands: Vec<Operand>) -> Self {
        Self { header: WitnessHeader::default(), operands }
    }

    /// Returns the serialized length of the witness.
    pub fn length(&self) -> usize {
        1 + self.operands.iter().map(Operand::length).sum::<usize>()
    }

    /// Serializes the witness into `out`, and returns how the written bytes break down.
    pub fn write_to(&self, out: &mut dyn BufMut) -> WitnessStats {
        let mut writer = StatsWriter::new(out);
        writer.put_u8(StatsColumn::Structure, self.header.version);
        for operand in &self.operands {
            operand.write_to(&mut writer);
        }
        writer.finish()
    }

    /// Serializes the witness.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length());
        self.write_to(&mut out);
        out
    }

    /// Decodes a witness from `bytes` with the [DecodeLimits::default] bounds.
    pub fn from_bytes(mut bytes: &[u8]) -> WitnessResult<Self> {
        Self::decode(&mut bytes)
    }

    /// Decodes a witness from the front of `buf`, consuming all of it.
    pub fn decode(buf: &mut &[u8]) -> WitnessResult<Self> {
        Self::decode_with_limits(buf, DecodeLimits::default())
    }

    /// Decodes a witness from the front of `buf`, consuming all of it.
    ///
    /// The input must end on an operand boundary. An unknown opcode or a field cut short fails
    /// the whole decode with the index and byte offset of the offending operand.
    pub fn decode_with_limits(buf: &mut &[u8], limits: DecodeLimits) -> WitnessResult<Self> {
        let stream_len = buf.len();
        let header = WitnessHeader::decode(buf)?;
        if header.version != WITNESS_VERSION {
            return Err(WitnessError::VersionMismatch {
                expected: WITNESS_VERSION,
                got: header.version,
            });
        }

        let mut operands = Vec::new();
        while let Some((&opcode, rest)) = buf.split_first() {
            let index = operands.len();
            if index >= limits.max_operands {
                return Err(WitnessError::TooManyOperands { max: limits.max_operands });
            }
            let offset = stream_len - buf.len();
            *buf = rest;

            let operand = Opcode::try_from(opcode)
                .and_then(|opcode| Operand::decode_fields(opcode, buf, &limits))
                .map_err(|source| {
                    debug!(target: "witness", index, offset, %source, "Failed to decode operand");
                    WitnessError::Operand { index, offset, source }
                })?;
            trace!(target: "witness", index, ?operand, "Read operand");
            operands.push(operand);
        }

        Ok(Self { header, operands })
    }
}
