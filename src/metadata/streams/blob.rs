//! Blob heap (`#Blob`) handle resolution.
//!
//! The `#Blob` heap stores length-prefixed binary data referenced by index
//! from the metadata tables; for identity resolution this is the public key
//! or public key token of the assembly. Each blob starts with an ECMA-335
//! compressed length prefix.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Result};

/// '#Blob' points to streams of bytes. Each valid blob is referenced by a
/// table index and carries its size as a compressed integer prefix:
///
/// * First byte `0bbbbbbb`: the blob holds `bbbbbbb` bytes.
/// * First bytes `10bbbbbb x`: the blob holds `(bbbbbb << 8 + x)` bytes.
/// * First bytes `110bbbbb x y z`: the blob holds
///   `(bbbbb << 24 + x << 16 + y << 8 + z)` bytes.
///
/// # Examples
///
/// ```rust
/// use dotident::metadata::streams::Blob;
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data).unwrap();
/// assert_eq!(blob.get(1).unwrap(), &[0x41, 0x42, 0x43]);
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is empty or doesn't start with a null byte
    /// (invalid blob heap format)
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// Get a view into the bytes contained at the provided heap index.
    ///
    /// ## Arguments
    /// * 'index' - The offset within the heap to be accessed (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the length prefix
    /// points past the end of the heap
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        if index > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(&self.data[index..]);
        let len = parser.read_compressed_uint()? as usize;
        let skip = parser.pos();

        let Some(data_start) = index.checked_add(skip) else {
            return Err(out_of_bounds_error!());
        };

        let Some(data_end) = data_start.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if data_start > self.data.len() || data_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[data_start..data_end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            0x08, 0xB7, 0x7A, 0x5C, 0x56, 0x19, 0x34, 0xE0, 0x89, // 8-byte token
            0x02, 0xAA, 0xBB,                                     // 2-byte blob
            0x00,                                                 // empty blob
        ];

        let blob = Blob::from(&data).unwrap();

        assert_eq!(
            blob.get(1).unwrap(),
            &[0xB7, 0x7A, 0x5C, 0x56, 0x19, 0x34, 0xE0, 0x89]
        );
        assert_eq!(blob.get(10).unwrap(), &[0xAA, 0xBB]);
        let empty_slice: &[u8] = &[];
        assert_eq!(blob.get(13).unwrap(), empty_slice);
    }

    #[test]
    fn length_past_end_is_rejected() {
        let data = [0x00, 0x7F, 0x01, 0x02];
        let blob = Blob::from(&data).unwrap();

        assert!(blob.get(1).is_err());
        assert!(blob.get(64).is_err());
    }

    #[test]
    fn heap_must_start_with_nul() {
        assert!(Blob::from(&[0x01, 0x02]).is_err());
        assert!(Blob::from(&[]).is_err());
    }
}
