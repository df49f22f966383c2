//! Physical file backend for memory-mapped I/O.
//!
//! [`Physical`] implements the [`crate::file::Backend`] trait over a read-only
//! memory mapping of a file on disk. The mapping keeps the file handle alive;
//! dropping the backend unmaps the view and then closes the handle, so the
//! resource chain unwinds in reverse acquisition order on every exit path.

use super::Backend;
use crate::Result;

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O for efficient access to files on disk.
///
/// Identity resolution touches a handful of scattered offsets, so a mapping is
/// cheaper than reading the file into memory. All access goes through
/// bounds-checked slices.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file backend by memory-mapping the specified file.
    ///
    /// The file is mapped read-only and shared. A zero-length file maps to an
    /// empty view; the empty-image check happens above this layer.
    ///
    /// # Arguments
    /// * `path` - Path to the PE file on disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotFound`] if the file cannot be opened or the
    /// mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn physical_maps_file() {
        let temp_path = std::env::temp_dir().join("dotident_physical_basic.bin");
        std::fs::write(&temp_path, [0x4D, 0x5A, 0x90, 0x00, 0x03]).unwrap();

        let physical = Physical::new(&temp_path).unwrap();
        assert_eq!(physical.len(), 5);
        assert_eq!(physical.data()[0], 0x4D);
        assert_eq!(physical.data_slice(1, 2).unwrap(), &[0x5A, 0x90]);

        assert!(physical.data_slice(4, 2).is_err());
        assert!(physical.data_slice(usize::MAX, 1).is_err());

        std::fs::remove_file(&temp_path).unwrap();
    }

    #[test]
    fn physical_missing_file() {
        let result = Physical::new("/nonexistent/path/to/file.dll");
        match result {
            Err(Error::NotFound(io_error)) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn physical_empty_file() {
        let temp_path = std::env::temp_dir().join("dotident_physical_empty.bin");
        std::fs::write(&temp_path, b"").unwrap();

        let physical = Physical::new(&temp_path).unwrap();
        assert_eq!(physical.len(), 0);
        assert!(physical.data_slice(0, 1).is_err());
        let empty_slice: &[u8] = &[];
        assert_eq!(physical.data_slice(0, 0).unwrap(), empty_slice);

        std::fs::remove_file(&temp_path).unwrap();
    }
}
