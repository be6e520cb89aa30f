//! Reading and writing unsigned bit fields inside a classic CAN payload.
//!
//! Bits are numbered big-endian across the whole payload: bit 0 is the most significant bit of byte 0, bit 63 is the least significant bit of byte 7.

use crate::signals::Error;

/// Width of a classic CAN payload in bits.
pub const PAYLOAD_BITS: u8 = 64;

/// Mask with the low `size` bits set.
pub fn mask(size: u8) -> u64 {
    if size >= PAYLOAD_BITS {
        u64::MAX
    } else {
        (1u64 << size) - 1
    }
}

pub(crate) fn check_bounds(position: u8, size: u8) -> Result<u32, Error> {
    if size == 0 || size > PAYLOAD_BITS || position as u16 + size as u16 > PAYLOAD_BITS as u16 {
        return Err(Error::OutOfBounds { position, size });
    }
    // Distance between the last bit of the span and the end of the payload
    Ok((PAYLOAD_BITS - position - size) as u32)
}

/// Read `size` bits starting at `position`.
pub fn extract(data: &[u8; 8], position: u8, size: u8) -> Result<u64, Error> {
    let shift = check_bounds(position, size)?;
    let word = u64::from_be_bytes(*data);
    Ok((word >> shift) & mask(size))
}

/// Write the low `size` bits of `value` at `position`, keeping every bit outside the span.
pub fn merge(data: &mut [u8; 8], position: u8, size: u8, value: u64) -> Result<(), Error> {
    let shift = check_bounds(position, size)?;
    let span = mask(size) << shift;

    let word = u64::from_be_bytes(*data);
    let word = (word & !span) | ((value & mask(size)) << shift);
    *data = word.to_be_bytes();

    Ok(())
}
