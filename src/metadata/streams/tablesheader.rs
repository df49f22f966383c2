//! Tables stream (`#~`) header and Assembly row lookup.
//!
//! The `#~` stream holds the compressed metadata tables: a 24-byte header,
//! one `u32` row count per present table, then the table rows back to back.
//! [`TablesHeader`] parses the header and row counts, and locates the single
//! Assembly row by skipping every preceding table using the row sizes from
//! [`TableInfo`]. No other table is decoded.
//!
//! ## Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.6 && II.22
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotident::metadata::streams::TablesHeader;
//!
//! # fn example(stream: &[u8]) -> dotident::Result<()> {
//! let tables = TablesHeader::from(stream)?;
//! match tables.assembly()? {
//!     Some(row) => println!("assembly flags: 0x{:08X}", row.flags),
//!     None => println!("image declares no assembly identity"),
//! }
//! # Ok(())
//! # }
//! ```

use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{AssemblyRaw, TableId, TableInfo},
    Result,
};

/// Header of the `#~` stream, together with the table sizing information
/// derived from it.
pub struct TablesHeader<'a> {
    /// Major version of table schemata, shall be 2
    pub major_version: u8,
    /// Minor version of table schemata, shall be 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths for all tables in this image
    pub info: TableInfo,
    /// The whole `#~` stream, rows included
    data: &'a [u8],
    /// The offset of the physical table rows, relative to the stream start
    tables_offset: usize,
}

impl<'a> TablesHeader<'a> {
    /// Create a `TablesHeader` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The `#~` stream, from its first header byte to its last row
    ///
    /// # Errors
    /// Returns an error if the data is too short, no table has rows, or the
    /// valid bitvector uses a table this crate does not understand.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let valid_bitvec = read_le::<u64>(&data[8..])?;
        if valid_bitvec == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid: valid_bitvec,
            sorted: read_le::<u64>(&data[16..])?,
            info: TableInfo::new(data, valid_bitvec)?,
            data,
            tables_offset: (24 + valid_bitvec.count_ones() * 4) as usize,
        })
    }

    /// Get the count of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Returns `true` if the given table is present with at least one row
    ///
    /// ## Arguments
    /// * `table_id` - The table to query
    #[must_use]
    pub fn has_table(&self, table_id: TableId) -> bool {
        self.info.get(table_id).rows > 0
    }

    /// Returns the offset of a table's first row, relative to the stream start.
    ///
    /// Tables are stored back to back in `TableId` order, so the offset is the
    /// row-count area end plus the accumulated sizes of all preceding tables.
    ///
    /// ## Arguments
    /// * `target` - The table to locate
    ///
    /// # Errors
    /// Returns an error if the accumulated offset leaves the stream.
    pub fn table_offset(&self, target: TableId) -> Result<usize> {
        let mut offset = self.tables_offset;

        for table_id in TableId::iter() {
            if table_id == target {
                break;
            }

            let rows = self.info.get(table_id).rows as usize;
            offset += rows * self.info.row_size(table_id) as usize;

            if offset > self.data.len() {
                return Err(out_of_bounds_error!());
            }
        }

        Ok(offset)
    }

    /// Locates and reads the single Assembly row of this image.
    ///
    /// # Returns
    /// * `Ok(Some(row))` - The image declares an identity
    /// * `Ok(None)` - The Assembly table is absent; a distinct absence, never a defaulted row
    ///
    /// # Errors
    /// Returns an error if the table position or row data is inconsistent
    /// with the stream size.
    pub fn assembly(&self) -> Result<Option<AssemblyRaw>> {
        if !self.has_table(TableId::Assembly) {
            return Ok(None);
        }

        let mut offset = self.table_offset(TableId::Assembly)?;
        let row = AssemblyRaw::read(self.data, &mut offset, &self.info)?;

        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal '#~' stream: Module (1 row) + Assembly (1 row), small heaps.
    fn crafted_stream() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0_u32.to_le_bytes()); // reserved
        data.push(2); // major_version
        data.push(0); // minor_version
        data.push(0); // heap size flags, all small
        data.push(1); // reserved
        data.extend_from_slice(&((1_u64 << 0x00) | (1_u64 << 0x20)).to_le_bytes()); // valid
        data.extend_from_slice(&0_u64.to_le_bytes()); // sorted
        data.extend_from_slice(&1_u32.to_le_bytes()); // Module rows
        data.extend_from_slice(&1_u32.to_le_bytes()); // Assembly rows

        // Module row: generation, name, mvid, encid, encbaseid
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);

        // Assembly row
        data.extend_from_slice(&0x8004_u32.to_le_bytes()); // hash_alg_id (SHA1)
        data.extend_from_slice(&1_u16.to_le_bytes()); // major
        data.extend_from_slice(&2_u16.to_le_bytes()); // minor
        data.extend_from_slice(&3_u16.to_le_bytes()); // build
        data.extend_from_slice(&4_u16.to_le_bytes()); // revision
        data.extend_from_slice(&0x0001_u32.to_le_bytes()); // flags (PublicKey)
        data.extend_from_slice(&1_u16.to_le_bytes()); // public_key blob index
        data.extend_from_slice(&1_u16.to_le_bytes()); // name string index
        data.extend_from_slice(&0_u16.to_le_bytes()); // culture string index (nil)

        data
    }

    #[test]
    fn crafted() {
        let data = crafted_stream();
        let tables = TablesHeader::from(&data).unwrap();

        assert_eq!(tables.major_version, 2);
        assert_eq!(tables.minor_version, 0);
        assert_eq!(tables.table_count(), 2);
        assert!(tables.has_table(TableId::Module));
        assert!(tables.has_table(TableId::Assembly));
        assert!(!tables.has_table(TableId::TypeDef));

        // 24-byte header + 2 row counts + one 10-byte Module row
        assert_eq!(tables.table_offset(TableId::Assembly).unwrap(), 42);

        let row = tables.assembly().unwrap().unwrap();
        assert_eq!(row.hash_alg_id, 0x8004);
        assert_eq!(row.major_version, 1);
        assert_eq!(row.minor_version, 2);
        assert_eq!(row.build_number, 3);
        assert_eq!(row.revision_number, 4);
        assert_eq!(row.flags, 0x0001);
        assert_eq!(row.public_key, 1);
        assert_eq!(row.name, 1);
        assert_eq!(row.culture, 0);
    }

    #[test]
    fn absent_assembly_table_is_reported_as_none() {
        let mut data = Vec::new();
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&[2, 0, 0, 1]);
        data.extend_from_slice(&(1_u64 << 0x00).to_le_bytes()); // Module only
        data.extend_from_slice(&0_u64.to_le_bytes());
        data.extend_from_slice(&1_u32.to_le_bytes());
        data.extend_from_slice(&[0x00; 10]); // Module row

        let tables = TablesHeader::from(&data).unwrap();
        assert!(tables.assembly().unwrap().is_none());
    }

    #[test]
    fn truncated_rows_are_rejected() {
        let mut data = crafted_stream();
        data.truncate(data.len() - 8);

        let tables = TablesHeader::from(&data).unwrap();
        assert!(tables.assembly().is_err());
    }

    #[test]
    fn enc_table_bits_are_rejected() {
        let mut data = crafted_stream();
        let valid = (1_u64 << 0x00) | (1_u64 << 0x1E) | (1_u64 << 0x20);
        data[8..16].copy_from_slice(&valid.to_le_bytes());

        assert!(TablesHeader::from(&data).is_err());
    }

    #[test]
    fn empty_bitvector_is_rejected() {
        let data = vec![0_u8; 24];
        assert!(TablesHeader::from(&data).is_err());
    }
}
