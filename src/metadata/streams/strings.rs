//! String heap (`#Strings`) handle resolution.
//!
//! The `#Strings` heap stores nul-terminated UTF-8 identifier strings
//! referenced by index from the metadata tables, the assembly name and
//! culture among them. [`Strings`] resolves such an index to a string slice.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::ffi::CStr;

use crate::Result;

/// '#Strings' holds the identifiers which are referenced from the metadata
/// tables. Index 0 is always the empty string; a valid heap starts with a
/// single nul byte.
///
/// # Examples
///
/// ```rust
/// use dotident::metadata::streams::Strings;
/// let data = &[0u8, b'H', b'e', b'l', b'l', b'o', 0u8];
/// let strings = Strings::from(data).unwrap();
/// assert_eq!(strings.get(1).unwrap(), "Hello");
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the string heap is empty or does not start with the
    /// mandatory nul byte
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Get a view into the string contained at the provided heap index.
    ///
    /// ## Arguments
    /// * 'index' - The offset within the heap to be accessed (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds, the string is not
    /// nul-terminated, or the bytes are not valid UTF-8
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 24] = [
            0x00,
            b'M', b'y', b'L', b'i', b'b', b'r', b'a', b'r', b'y', 0x00,
            b'e', b'n', b'-', b'U', b'S', 0x00,
            b'<', b'M', b'o', b'd', b'u', b'l', b'e',
        ];

        let str_view = Strings::from(&data).unwrap();

        assert_eq!(str_view.get(0).unwrap(), "");
        assert_eq!(str_view.get(1).unwrap(), "MyLibrary");
        assert_eq!(str_view.get(11).unwrap(), "en-US");
        assert_eq!(str_view.get(13).unwrap(), "-US");

        // trailing run is not nul-terminated
        assert!(str_view.get(17).is_err());
        assert!(str_view.get(1024).is_err());
    }

    #[test]
    fn heap_must_start_with_nul() {
        assert!(Strings::from(&[b'A', 0x00]).is_err());
        assert!(Strings::from(&[]).is_err());
    }
}
