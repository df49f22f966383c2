//! Low-level byte order and safe reading utilities for PE and CIL parsing.
//!
//! This module provides endian-aware, bounds-checked reading of primitive
//! types from byte buffers. PE files and CIL metadata are little-endian
//! throughout, so only little-endian readers are provided.
//!
//! # Key Components
//!
//! - [`crate::file::io::CilIO`] - Trait defining byte-array conversion for primitive types
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset, advancing the offset
//! - [`crate::file::io::read_le_at_dyn`] - Read a 2- or 4-byte index, promoted to `u32`
//!
//! All functions return [`crate::Result`] and fail with a bounds error instead
//! of reading past the end of the buffer.

use crate::Result;

/// Trait for type-specific safe binary data reading.
///
/// Implemented for the unsigned integer widths that occur in PE headers and
/// CIL metadata. Each implementation defines the fixed-size byte array needed
/// for the type and the conversion from little-endian bytes.
pub trait CilIO: Sized {
    /// Byte array type holding the on-disk representation of this value.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

// Implement CilIO support for u64
impl CilIO for u64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u64::from_le_bytes(bytes)
    }
}

// Implement CilIO support for u32
impl CilIO for u32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u32::from_le_bytes(bytes)
    }
}

// Implement CilIO support for u16
impl CilIO for u16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u16::from_le_bytes(bytes)
    }
}

// Implement CilIO support for u8
impl CilIO for u8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        bytes[0]
    }
}

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
///
/// # Errors
///
/// Returns an error if the buffer holds fewer bytes than `T` requires.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the read position (advanced after reading)
///
/// # Errors
///
/// Returns an error if there are insufficient bytes at the offset.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Dynamically reads either a 2-byte or 4-byte value in little-endian byte order.
///
/// Metadata heap and table indexes are stored as `u16` or `u32` depending on
/// heap and table sizes; this reads the right width and promotes to `u32`.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the read position (advanced after reading)
/// * `is_large` - If `true`, reads 4 bytes; if `false`, reads 2 bytes
///
/// # Errors
///
/// Returns an error if there are insufficient bytes at the offset.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_le_fixed_widths() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

        assert_eq!(read_le::<u8>(&data).unwrap(), 0x01);
        assert_eq!(read_le::<u16>(&data).unwrap(), 0x0201);
        assert_eq!(read_le::<u32>(&data).unwrap(), 0x0403_0201);
        assert_eq!(read_le::<u64>(&data).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_at_advances_offset() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
        let mut offset = 0;

        let first: u16 = read_le_at(&data, &mut offset).unwrap();
        let second: u16 = read_le_at(&data, &mut offset).unwrap();
        let third: u32 = read_le_at(&data, &mut offset).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(third, 3);
        assert_eq!(offset, 8);
    }

    #[test]
    fn read_le_at_dyn_widths() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut offset = 0;

        assert_eq!(read_le_at_dyn(&data, &mut offset, false).unwrap(), 1);
        assert_eq!(offset, 2);
        assert_eq!(read_le_at_dyn(&data, &mut offset, true).unwrap(), 2);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_past_end_fails() {
        let data = [0x01, 0x02];
        let mut offset = 1;

        assert!(read_le_at::<u32>(&data, &mut offset).is_err());
        assert_eq!(offset, 1);

        assert!(read_le::<u32>(&data).is_err());
        assert!(read_le_at_dyn(&data, &mut 1, false).is_err());
    }
}
