//! Exact-size arithmetic for RLP length prefixes.
//!
//! Every function here is pure: sizes are computed without materializing the encoding, and the
//! writers place bytes into a caller-supplied buffer starting at `pos`, returning the new write
//! cursor. A buffer that is too small for the prefix is a sizing bug in the caller, so the writers
//! panic instead of truncating.
//!
//! The double-wrap variants describe a byte string that is RLP encoded once and then encoded
//! again as the payload of a second string, which is how a raw value lands inside a trie leaf.

use alloy_rlp::{EMPTY_LIST_CODE, EMPTY_STRING_CODE};

/// The longest payload whose length fits into the first byte of its prefix.
pub(crate) const MAX_SHORT_PAYLOAD: usize = 55;

/// Base of the first byte of a long string prefix, `0xB7 + len(len)`.
pub(crate) const LONG_STRING_OFFSET: u8 = 0xB7;

/// Base of the first byte of a long list prefix, `0xF7 + len(len)`.
const LONG_LIST_OFFSET: u8 = 0xF7;

/// Returns the number of big-endian bytes needed to represent `value`.
const fn be_len(value: u64) -> usize {
    (u64::BITS - value.leading_zeros()).div_ceil(8) as usize
}

/// Returns the size of a string or list header for a payload of `payload_len` bytes.
const fn header_len(payload_len: usize) -> usize {
    if payload_len <= MAX_SHORT_PAYLOAD { 1 } else { 1 + be_len(payload_len as u64) }
}

#[track_caller]
fn check_capacity(buf: &[u8], pos: usize, needed: usize) {
    assert!(
        pos.checked_add(needed).is_some_and(|end| end <= buf.len()),
        "buffer of {} bytes cannot hold {needed} bytes at offset {pos}",
        buf.len()
    );
}

#[track_caller]
fn write_header(buf: &mut [u8], pos: usize, payload_len: usize, short: u8, long: u8) -> usize {
    let size = header_len(payload_len);
    check_capacity(buf, pos, size);
    if payload_len <= MAX_SHORT_PAYLOAD {
        buf[pos] = short + payload_len as u8;
    } else {
        let len_of_len = size - 1;
        buf[pos] = long + len_of_len as u8;
        let be = (payload_len as u64).to_be_bytes();
        buf[pos + 1..pos + size].copy_from_slice(&be[be.len() - len_of_len..]);
    }
    pos + size
}

/// Returns the length of the string prefix for a payload of `payload_len` bytes.
///
/// Payloads shorter than two bytes report `0`: a single byte below `0x80` is its own encoding,
/// and the caller owns the decision for the remaining short cases (see [string_len]). Otherwise
/// the result is `1` up to 55 bytes, then `1 + len(len)`: `2` up to 255, `3` up to 65535 and `4`
/// up to `2^24 - 1`.
pub const fn prefix_len(payload_len: usize) -> usize {
    if payload_len < 2 { 0 } else { header_len(payload_len) }
}

/// Writes the string prefix for a payload of `payload_len` bytes at `pos`.
///
/// Lengths below 56 are written as `0x80 + len`, longer ones as `0xB7 + len(len)` followed by the
/// big-endian length.
///
/// # Panics
/// If `buf` does not have room for the prefix at `pos`.
#[track_caller]
pub fn write_prefix(buf: &mut [u8], pos: usize, payload_len: usize) -> usize {
    write_header(buf, pos, payload_len, EMPTY_STRING_CODE, LONG_STRING_OFFSET)
}

/// Returns the combined prefix length of a `payload_len` byte string that is wrapped twice.
///
/// `first_byte` is only consulted for single byte payloads: below `0x80` the byte passes through
/// both wraps untouched and no prefix is needed.
pub const fn prefix_len_double(payload_len: usize, first_byte: u8) -> usize {
    if payload_len == 1 && first_byte < EMPTY_STRING_CODE {
        return 0;
    }
    let inner = header_len(payload_len);
    header_len(payload_len + inner) + inner
}

/// Writes the combined prefix of a `payload_len` byte string that is wrapped twice, outer prefix
/// first. Always agrees with [prefix_len_double] on the number of bytes written.
///
/// # Panics
/// If `buf` does not have room for the prefix at `pos`.
#[track_caller]
pub fn write_prefix_double(
    buf: &mut [u8],
    pos: usize,
    payload_len: usize,
    first_byte: u8,
) -> usize {
    let size = prefix_len_double(payload_len, first_byte);
    check_capacity(buf, pos, size);
    if size == 0 {
        return pos;
    }
    let inner = header_len(payload_len);
    let pos = write_prefix(buf, pos, payload_len + inner);
    write_prefix(buf, pos, payload_len)
}

/// Returns the length of the canonical RLP encoding of an unsigned integer.
pub const fn uint_len(value: u64) -> usize {
    if value < EMPTY_STRING_CODE as u64 { 1 } else { 1 + be_len(value) }
}

/// Writes the canonical RLP encoding of an unsigned integer at `pos`: `0x80` for zero, the byte
/// itself below `0x80`, and a string of the minimal big-endian bytes otherwise.
///
/// # Panics
/// If `buf` does not have room for the encoding at `pos`.
#[track_caller]
pub fn write_uint(buf: &mut [u8], pos: usize, value: u64) -> usize {
    let size = uint_len(value);
    check_capacity(buf, pos, size);
    match value {
        0 => buf[pos] = EMPTY_STRING_CODE,
        1..0x80 => buf[pos] = value as u8,
        _ => {
            buf[pos] = EMPTY_STRING_CODE + (size - 1) as u8;
            let be = value.to_be_bytes();
            buf[pos + 1..pos + size].copy_from_slice(&be[be.len() - (size - 1)..]);
        }
    }
    pos + size
}

/// Returns the full RLP string length of `payload`, prefix included.
pub const fn string_len(payload: &[u8]) -> usize {
    match payload {
        [byte] if *byte < EMPTY_STRING_CODE => 1,
        _ => header_len(payload.len()) + payload.len(),
    }
}

/// Writes `payload` as an RLP string at `pos`.
///
/// # Panics
/// If `buf` does not have room for the string at `pos`.
#[track_caller]
pub fn write_string(buf: &mut [u8], pos: usize, payload: &[u8]) -> usize {
    check_capacity(buf, pos, string_len(payload));
    let pos = match payload {
        [byte] if *byte < EMPTY_STRING_CODE => pos,
        _ => write_prefix(buf, pos, payload.len()),
    };
    buf[pos..pos + payload.len()].copy_from_slice(payload);
    pos + payload.len()
}

/// Returns the length of `payload` wrapped into an RLP string twice.
pub const fn string_len_double(payload: &[u8]) -> usize {
    let first_byte = match payload {
        [first, ..] => *first,
        [] => EMPTY_STRING_CODE,
    };
    prefix_len_double(payload.len(), first_byte) + payload.len()
}

/// Writes `payload` wrapped into an RLP string twice at `pos`.
///
/// # Panics
/// If `buf` does not have room for the encoding at `pos`.
#[track_caller]
pub fn write_string_double(buf: &mut [u8], pos: usize, payload: &[u8]) -> usize {
    check_capacity(buf, pos, string_len_double(payload));
    let first_byte = payload.first().copied().unwrap_or(EMPTY_STRING_CODE);
    let pos = write_prefix_double(buf, pos, payload.len(), first_byte);
    buf[pos..pos + payload.len()].copy_from_slice(payload);
    pos + payload.len()
}

/// Returns the length of the list header for a payload of `payload_len` bytes.
pub const fn list_prefix_len(payload_len: usize) -> usize {
    header_len(payload_len)
}

/// Writes the list header for a payload of `payload_len` bytes at `pos`.
///
/// # Panics
/// If `buf` does not have room for the header at `pos`.
#[track_caller]
pub fn write_list_prefix(buf: &mut [u8], pos: usize, payload_len: usize) -> usize {
    write_header(buf, pos, payload_len, EMPTY_LIST_CODE, LONG_LIST_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{vec, vec::Vec};
    use alloy_primitives::hex;
    use alloy_rlp::{Encodable, Header};

    /// Reads back the payload length from a string prefix, returning it with the prefix size.
    fn read_prefix(buf: &[u8]) -> (usize, usize) {
        match buf[0] {
            b @ 0x80..=0xB7 => ((b - 0x80) as usize, 1),
            b @ 0xB8..=0xBF => {
                let len_of_len = (b - 0xB7) as usize;
                let len =
                    buf[1..=len_of_len].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
                (len, 1 + len_of_len)
            }
            b => panic!("not a string prefix: {b:#04x}"),
        }
    }

    /// The bytes the single-wrap writer emits in front of a payload of `len` bytes.
    fn single_wrap(len: usize, first_byte: u8) -> Vec<u8> {
        if len == 1 && first_byte < 0x80 {
            return Vec::new();
        }
        let mut buf = [0u8; 9];
        let end = write_prefix(&mut buf, 0, len);
        buf[..end].to_vec()
    }

    #[test]
    fn test_prefix_len_thresholds() {
        let cases = [
            (0, 0),
            (1, 0),
            (2, 1),
            (55, 1),
            (56, 2),
            (255, 2),
            (256, 3),
            (65535, 3),
            (65536, 4),
            ((1 << 24) - 1, 4),
            (1 << 24, 5),
        ];
        for (len, expected) in cases {
            assert_eq!(prefix_len(len), expected, "payload of {len} bytes");
        }
    }

    #[test]
    fn test_write_prefix_known_vectors() {
        let mut buf = [0u8; 4];
        assert_eq!(write_prefix(&mut buf, 0, 3), 1);
        assert_eq!(buf[0], 0x83);

        assert_eq!(write_prefix(&mut buf, 0, 56), 2);
        assert_eq!(buf[..2], hex!("b838"));

        assert_eq!(write_prefix(&mut buf, 1, 1024), 4);
        assert_eq!(buf[1..4], hex!("b90400"));
    }

    #[test]
    fn test_uint_matches_rlp() {
        let mut expected = Vec::with_capacity(9);
        let mut buf = [0u8; 9];
        for n in 0..10_000_000u64 {
            expected.clear();
            n.encode(&mut expected);

            assert_eq!(uint_len(n), expected.len(), "length of {n}");
            let end = write_uint(&mut buf, 0, n);
            assert_eq!(&buf[..end], expected.as_slice(), "encoding of {n}");
        }
    }

    #[test]
    fn test_uint_large_values() {
        for n in [u32::MAX as u64, u32::MAX as u64 + 1, u64::MAX] {
            let mut buf = [0u8; 9];
            let end = write_uint(&mut buf, 0, n);
            assert_eq!(&buf[..end], alloy_rlp::encode(n).as_slice());
        }
    }

    #[test]
    fn test_write_prefix_roundtrip() {
        let mut buf = [0u8; 8];
        let mut reference = Vec::with_capacity(8);
        for len in 2..=70_000 {
            let end = write_prefix(&mut buf, 0, len);
            assert_eq!(end, prefix_len(len), "prefix size for {len}");
            assert_eq!(read_prefix(&buf[..end]), (len, end));

            reference.clear();
            Header { list: false, payload_length: len }.encode(&mut reference);
            assert_eq!(&buf[..end], reference.as_slice());
        }
    }

    #[test]
    fn test_short_strings() {
        let mut buf = [0u8; 2];
        assert_eq!(string_len(&[]), 1);
        assert_eq!(write_string(&mut buf, 0, &[]), 1);
        assert_eq!(buf[0], 0x80);

        assert_eq!(string_len(&[0x7f]), 1);
        assert_eq!(write_string(&mut buf, 0, &[0x7f]), 1);
        assert_eq!(buf[0], 0x7f);

        assert_eq!(string_len(&[0x80]), 2);
        assert_eq!(write_string(&mut buf, 0, &[0x80]), 2);
        assert_eq!(buf, [0x81, 0x80]);
    }

    #[test]
    fn test_write_string_matches_rlp() {
        for len in [0, 1, 2, 55, 56, 255, 256, 1024, 65536] {
            let payload = vec![0xAB; len];
            let mut buf = vec![0u8; string_len(&payload)];
            assert_eq!(write_string(&mut buf, 0, &payload), buf.len());
            assert_eq!(buf, alloy_rlp::encode(payload.as_slice()));
        }
    }

    #[test]
    fn test_prefix_len_double_thresholds() {
        let cases = [
            (0, 2),
            (2, 2),
            (54, 2),
            (55, 3),
            (56, 4),
            (253, 4),
            (254, 5),
            (255, 5),
            (256, 6),
            (65532, 6),
            (65533, 7),
            (65535, 7),
            (65536, 8),
        ];
        for (len, expected) in cases {
            assert_eq!(prefix_len_double(len, 0xFF), expected, "payload of {len} bytes");
        }
        assert_eq!(prefix_len_double(1, 0x00), 0);
        assert_eq!(prefix_len_double(1, 0x7F), 0);
        assert_eq!(prefix_len_double(1, 0x80), 2);
        assert_eq!(prefix_len_double(1, 0xFF), 2);
    }

    #[test]
    fn test_double_wrap_equals_two_single_wraps() {
        let mut buf = [0u8; 16];
        for len in 0..=70_000 {
            let first_bytes: &[u8] = if len < 2 { &[0x00, 0x7F, 0x80, 0xFF] } else { &[0xFF] };
            for &first_byte in first_bytes {
                let inner = single_wrap(len, first_byte);
                let wrapped_len = inner.len() + len;
                let wrapped_first = inner.first().copied().unwrap_or(first_byte);
                let mut expected = single_wrap(wrapped_len, wrapped_first);
                expected.extend_from_slice(&inner);

                assert_eq!(prefix_len_double(len, first_byte), expected.len(), "size for {len}");
                let end = write_prefix_double(&mut buf, 0, len, first_byte);
                assert_eq!(&buf[..end], expected.as_slice(), "bytes for {len}");
            }
        }
    }

    #[test]
    fn test_string_double_matches_nested_rlp() {
        for len in [0, 1, 2, 54, 55, 56, 253, 254, 255, 256, 300] {
            for first_byte in [0x01, 0xC0] {
                let mut payload = vec![0x11; len];
                if let Some(first) = payload.first_mut() {
                    *first = first_byte;
                }
                let once = alloy_rlp::encode(payload.as_slice());
                let twice = alloy_rlp::encode(once.as_slice());

                let mut buf = vec![0u8; string_len_double(&payload)];
                assert_eq!(write_string_double(&mut buf, 0, &payload), twice.len());
                assert_eq!(buf, twice);
            }
        }
    }

    #[test]
    fn test_list_prefix() {
        let mut buf = [0u8; 4];
        assert_eq!(write_list_prefix(&mut buf, 0, 0), 1);
        assert_eq!(buf[0], 0xC0);
        assert_eq!(write_list_prefix(&mut buf, 0, 55), 1);
        assert_eq!(buf[0], 0xF7);
        assert_eq!(list_prefix_len(83), 2);
        assert_eq!(write_list_prefix(&mut buf, 0, 83), 2);
        assert_eq!(buf[..2], hex!("f853"));
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn test_write_prefix_out_of_bounds() {
        let mut buf = [0u8; 2];
        write_prefix(&mut buf, 0, 1024);
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn test_write_prefix_double_out_of_bounds() {
        let mut buf = [0u8; 4];
        write_prefix_double(&mut buf, 1, 300, 0xFF);
    }
}
