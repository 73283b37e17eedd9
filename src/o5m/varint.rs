//! Variable-length integer codec used throughout the o5m wire format.
//!
//! Unsigned values are little-endian 7-bit groups with the high bit as a
//! continuation flag. Signed values store the sign in bit 0 of the first
//! byte, so the first byte contributes 6 value bits and later bytes 7 each;
//! the magnitude of a negative value is offset by one so zero has a single
//! representation.

use std::io::Read;

use super::O5mError;

/// Read a single byte, mapping end-of-stream to `TruncatedInput`.
pub(crate) fn read_byte<R: Read>(r: &mut R) -> Result<u8, O5mError> {
    let mut buf = [0u8; 1];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(buf[0]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(O5mError::TruncatedInput),
        Err(e) => Err(O5mError::Io(e)),
    }
}

/// Decode an unsigned varint. Groups past bit 63 are discarded, matching the
/// two's-complement truncation of the target width.
pub fn read_unsigned<R: Read>(r: &mut R) -> Result<u64, O5mError> {
    let first = read_byte(r)?;
    read_unsigned_cont(first, r)
}

/// Decode an unsigned varint whose first byte was already consumed.
pub fn read_unsigned_cont<R: Read>(first: u8, r: &mut R) -> Result<u64, O5mError> {
    let mut n = u64::from(first & 0x7f);
    if first & 0x80 == 0 {
        return Ok(n);
    }
    let mut shift = 7u32;
    loop {
        let b = read_byte(r)?;
        n |= u64::from(b & 0x7f).checked_shl(shift).unwrap_or(0);
        if b & 0x80 == 0 {
            return Ok(n);
        }
        shift += 7;
    }
}

/// Decode a signed varint.
pub fn read_signed<R: Read>(r: &mut R) -> Result<i64, O5mError> {
    let mut n: u64 = 0;
    let mut shift = 0u32;
    let mut negative = false;
    loop {
        let b = read_byte(r)?;
        let v = b & 0x7f;
        if shift == 0 {
            negative = v & 1 != 0;
            n |= u64::from(v >> 1);
            shift = 6;
        } else {
            n |= u64::from(v).checked_shl(shift).unwrap_or(0);
            shift += 7;
        }
        if b & 0x80 == 0 {
            return Ok(if negative {
                (n.wrapping_add(1) as i64).wrapping_neg()
            } else {
                n as i64
            });
        }
    }
}

/// Encode an unsigned varint.
pub fn write_unsigned(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let b = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            return;
        }
        out.push(b | 0x80);
    }
}

/// Encode a signed varint.
pub fn write_signed(out: &mut Vec<u8>, v: i64) {
    let sign = (v < 0) as u8;
    // For negatives the stored magnitude is |v| - 1, i.e. the bitwise not.
    let mut n: u64 = if v < 0 { !v as u64 } else { v as u64 };
    let first = sign | (((n & 0x3f) as u8) << 1);
    n >>= 6;
    if n == 0 {
        out.push(first);
        return;
    }
    out.push(first | 0x80);
    loop {
        let b = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(b);
            return;
        }
        out.push(b | 0x80);
    }
}
