//! PE file abstraction for identity resolution.
//!
//! This module provides the byte-view and structural-header layer of the
//! crate. It abstracts over the data source (memory-mapped file or owned
//! buffer) behind the [`Backend`] trait, parses the PE structural chain (DOS
//! stub, COFF header, optional header, section table, data directories) with
//! goblin, and exposes the few facts identity resolution needs: the CLR
//! runtime directory, the COFF machine type, the image bitness, and RVA to
//! file-offset translation.
//!
//! # Resource lifecycle
//!
//! [`File::from_file`] acquires resources in a fixed order: the OS file
//! handle, the read-only memory mapping, and the parsed PE borrow over the
//! mapping. Each level is an RAII guard. The self-referencing [`File`] drops
//! its parsed PE before the backing mapping, and the mapping keeps the file
//! handle alive until it is unmapped, so release happens in strict reverse
//! order whether the call succeeds or fails at any stage.
//!
//! # Key Components
//!
//! - [`File`] - Main PE abstraction, validated to contain a CLR runtime header
//! - [`Backend`] - Trait over the underlying data source
//! - [`crate::file::physical::Physical`] - Memory-mapped backend for disk access
//! - [`crate::file::memory::Memory`] - In-memory buffer backend
//! - [`crate::file::parser::Parser`] / [`crate::file::io`] - Parsing utilities

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use goblin::pe::{header::Header, optional_header::MAGIC_64, PE};
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

/// Backend trait for image data sources.
///
/// Abstracts over the source of PE bytes, allowing both on-disk and in-memory
/// representations. All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

#[self_referencing]
/// Represents a loaded PE file that carries a CLR runtime header.
///
/// Wraps the parsed PE over its backing bytes and provides access to the
/// headers and address translation needed to locate the embedded metadata.
/// Loading validates that the image is a PE with an optional header and a CLR
/// runtime directory; anything else is rejected as malformed.
///
/// # Examples
///
/// ```rust,no_run
/// use dotident::File;
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("assembly.dll"))?;
/// let (clr_rva, clr_size) = file.clr();
/// println!("CLR runtime header: RVA=0x{:x}, size={}", clr_rva, clr_size);
/// # Ok::<(), dotident::Error>(())
/// ```
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// The parsed PE structure, referencing the data.
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Loads a PE file from the given path.
    ///
    /// The file is memory-mapped for access; the mapping and the file handle
    /// are released when the returned [`File`] is dropped.
    ///
    /// # Arguments
    ///
    /// * `file` - Path to the PE file on disk.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotFound`] if the file cannot be opened or mapped
    /// - [`crate::Error::Empty`] if the file has zero length
    /// - [`crate::Error::Malformed`] if the data is not a PE with a CLR runtime header
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Loads a PE file from a memory buffer.
    ///
    /// # Arguments
    ///
    /// * `data` - The bytes of the PE file.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Empty`] if the buffer is empty
    /// - [`crate::Error::Malformed`] if the data is not a PE with a CLR runtime header
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    /// Internal loader for any backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty, not a valid PE, or missing the
    /// CLR runtime directory. Goblin parse failures are re-signaled as
    /// [`crate::Error::Malformed`] so callers only ever observe the public
    /// error kinds.
    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let data = data.as_ref();
            match PE::parse(data.data()) {
                Ok(pe) => match pe.header.optional_header {
                    Some(optional_header) => {
                        if optional_header
                            .data_directories
                            .get_clr_runtime_header()
                            .is_none()
                        {
                            Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        } else {
                            Ok(pe)
                        }
                    }
                    None => Err(malformed_error!("File does not have an OptionalHeader")),
                },
                Err(error) => Err(malformed_error!("PE parsing failed - {}", error)),
            }
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the PE header.
    #[must_use]
    pub fn header(&self) -> &Header {
        self.with_pe(|pe| &pe.header)
    }

    /// Returns the COFF machine type of the image.
    #[must_use]
    pub fn machine(&self) -> u16 {
        self.with_pe(|pe| pe.header.coff_header.machine)
    }

    /// Returns `true` if the image uses the PE32+ (64-bit) optional header format.
    ///
    /// Decided by the optional header magic, not the machine type; the two are
    /// reconciled later during architecture classification.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.with_pe(|pe| match pe.header.optional_header {
            Some(optional_header) => optional_header.standard_fields.magic == MAGIC_64,
            None => false,
        })
    }

    /// Returns the RVA and size (in bytes) of the CLR runtime header.
    ///
    /// # Returns
    ///
    /// A tuple containing `(rva, size)` of the CLR header data directory.
    ///
    /// # Panics
    ///
    /// Panics if the CLR runtime header is missing; its presence was verified
    /// during the initial load.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        self.with_pe(|pe| {
            let optional_header = pe.header.optional_header.unwrap();
            let clr_dir = optional_header
                .data_directories
                .get_clr_runtime_header()
                .unwrap();

            (clr_dir.virtual_address as usize, clr_dir.size as usize)
        })
    }

    /// Returns the raw data of the loaded file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// Returns a slice of the file data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The offset to start the slice from.
    /// * `len` - The length of the slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Converts a relative virtual address (RVA) to a file offset.
    ///
    /// Walks the section table and maps the RVA through the section that
    /// contains it. An RVA exactly at a section start is valid; crafted
    /// minimal images place the CLR header there.
    ///
    /// # Arguments
    ///
    /// * `rva` - The RVA to convert.
    ///
    /// # Errors
    ///
    /// Returns an error if the RVA does not fall inside any section or the
    /// section table is inconsistent.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            for section in &pe.sections {
                let Some(section_max) = section.virtual_address.checked_add(section.virtual_size)
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                let rva_u32 = u32::try_from(rva)
                    .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;
                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}
