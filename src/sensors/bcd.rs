//! Packed binary-coded decimal, two digits per byte

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    #[error("{0} does not fit in two BCD digits")]
    ValueTooLarge(u8),
    #[error("0x{0:02x} contains a non-decimal nibble")]
    InvalidNibble(u8),
}

/// Encode `value` (0..=99) as a packed BCD byte.
pub const fn encode(value: u8) -> Result<u8, ConversionError> {
    if value > 99 {
        return Err(ConversionError::ValueTooLarge(value));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

/// Decode a packed BCD byte.
pub const fn decode(byte: u8) -> Result<u8, ConversionError> {
    let high = byte >> 4;
    let low = byte & 0x0f;
    if high > 9 || low > 9 {
        return Err(ConversionError::InvalidNibble(byte));
    }
    Ok(high * 10 + low)
}
