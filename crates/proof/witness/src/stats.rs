//! Byte accounting for serialized witnesses.

use alloy_rlp::{BufMut, Encodable};

/// A category of bytes in a serialized witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatsColumn {
    /// The header, opcodes, branch masks and account flags.
    Structure,
    /// Node hashes.
    Hashes,
    /// Contract bytecode.
    Codes,
    /// Leaf and extension keys.
    LeafKeys,
    /// Leaf values, account nonces and balances.
    LeafValues,
}

/// The number of bytes written per [StatsColumn] while serializing a witness.
///
/// The statistics are observational; they never change the bytes that are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WitnessStats {
    /// Bytes in [StatsColumn::Structure].
    pub structure: usize,
    /// Bytes in [StatsColumn::Hashes].
    pub hashes: usize,
    /// Bytes in [StatsColumn::Codes].
    pub codes: usize,
    /// Bytes in [StatsColumn::LeafKeys].
    pub leaf_keys: usize,
    /// Bytes in [StatsColumn::LeafValues].
    pub leaf_values: usize,
}

impl WitnessStats {
    /// Returns the bytes counted in `column`.
    pub const fn get(&self, column: StatsColumn) -> usize {
        match column {
            StatsColumn::Structure => self.structure,
            StatsColumn::Hashes => self.hashes,
            StatsColumn::Codes => self.codes,
            StatsColumn::LeafKeys => self.leaf_keys,
            StatsColumn::LeafValues => self.leaf_values,
        }
    }

    /// Returns the total size of the witness.
    pub const fn total(&self) -> usize {
        self.structure + self.hashes + self.codes + self.leaf_keys + self.leaf_values
    }

    const fn record(&mut self, column: StatsColumn, len: usize) {
        match column {
            StatsColumn::Structure => self.structure += len,
            StatsColumn::Hashes => self.hashes += len,
            StatsColumn::Codes => self.codes += len,
            StatsColumn::LeafKeys => self.leaf_keys += len,
            StatsColumn::LeafValues => self.leaf_values += len,
        }
    }
}

/// A writer that attributes every byte it forwards to a [StatsColumn].
pub(crate) struct StatsWriter<'a> {
    out: &'a mut dyn BufMut,
    stats: WitnessStats,
}

impl core::fmt::Debug for StatsWriter<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StatsWriter").field("stats", &self.stats).finish_non_exhaustive()
    }
}

impl<'a> StatsWriter<'a> {
    pub(crate) fn new(out: &'a mut dyn BufMut) -> Self {
        Self { out, stats: WitnessStats::default() }
    }

    pub(crate) fn put_u8(&mut self, column: StatsColumn, byte: u8) {
        self.stats.record(column, 1);
        self.out.put_u8(byte);
    }

    pub(crate) fn put_slice(&mut self, column: StatsColumn, bytes: &[u8]) {
        self.stats.record(column, bytes.len());
        self.out.put_slice(bytes);
    }

    pub(crate) fn put_rlp<T: Encodable + ?Sized>(&mut self, column: StatsColumn, item: &T) {
        self.stats.record(column, item.length());
        item.encode(self.out);
    }

    pub(crate) const fn finish(self) -> WitnessStats {
        self.stats
    }
}
