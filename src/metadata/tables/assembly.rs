use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::tables::TableInfo,
    Result,
};

/// The raw Assembly table row with unresolved heap handles, ECMA-335 II.22.2.
///
/// An image declares its identity in at most one of these rows. Version
/// components are stored as 2-byte values on disk but widened to `u32` here
/// for alignment; the identity layer narrows them back with saturation.
pub struct AssemblyRaw {
    /// a 4-byte constant of type `AssemblyHashAlgorithm`, ECMA-335 II.23.1.1
    pub hash_alg_id: u32,
    /// a 2-byte value specifying the Major version number
    pub major_version: u32,
    /// a 2-byte value specifying the Minor version number
    pub minor_version: u32,
    /// a 2-byte value specifying the Build number
    pub build_number: u32,
    /// a 2-byte value specifying the Revision number
    pub revision_number: u32,
    /// a 4-byte bitmask of type `AssemblyFlags`, ECMA-335 II.23.1.2
    pub flags: u32,
    /// an index into the `#Blob` heap, nil when the assembly has no key material
    pub public_key: u32,
    /// an index into the `#Strings` heap
    pub name: u32,
    /// an index into the `#Strings` heap, nil for culture-neutral assemblies
    pub culture: u32,
}

impl AssemblyRaw {
    /// Read and parse an Assembly table row from the tables stream.
    ///
    /// # Row Layout
    /// - `hash_alg_id`: 4 bytes (fixed)
    /// - `major_version`: 2 bytes (fixed)
    /// - `minor_version`: 2 bytes (fixed)
    /// - `build_number`: 2 bytes (fixed)
    /// - `revision_number`: 2 bytes (fixed)
    /// - `flags`: 4 bytes (fixed)
    /// - `public_key`: 2 or 4 bytes (blob heap index)
    /// - `name`: 2 or 4 bytes (string heap index)
    /// - `culture`: 2 or 4 bytes (string heap index)
    ///
    /// # Arguments
    /// * `data` - The `#~` stream data
    /// * `offset` - Current read position (updated after reading)
    /// * `info` - Table sizing information for the heap index widths
    ///
    /// # Errors
    /// Returns an error if the data is insufficient for one full row.
    pub fn read(data: &[u8], offset: &mut usize, info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            major_version: u32::from(read_le_at::<u16>(data, offset)?),
            minor_version: u32::from(read_le_at::<u16>(data, offset)?),
            build_number: u32::from(read_le_at::<u16>(data, offset)?),
            revision_number: u32::from(read_le_at::<u16>(data, offset)?),
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_le_at_dyn(data, offset, info.is_large_blob())?,
            name: read_le_at_dyn(data, offset, info.is_large_str())?,
            culture: read_le_at_dyn(data, offset, info.is_large_str())?,
        })
    }
}
