use strum::IntoEnumIterator;

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{CodedIndexType, TableId, KNOWN_TABLES},
    Result,
};

/// Holds information about the size that reference index fields have
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
    /// If the count is > `u16::MAX`, indexes of other tables into this table are 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates a new `TableRowInfo` instance with the given row count.
    ///
    /// # Arguments
    /// * `rows` - The number of rows in the table
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            let zeros = rows.leading_zeros();
            // Safe: 32 - zeros is always <= 32, fits in u8
            (32 - zeros) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// `TableInfo` holds the row counts and reference index field sizes of all
/// tables in this image, and from them the byte size of every row layout.
///
/// Row sizes are what make it possible to find the Assembly table without a
/// full table decoder: the tables of the `#~` stream are stored back to back,
/// so the position of any table is the sum of `row_count * row_size` over
/// every table that precedes it.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

impl TableInfo {
    /// Build a new `TableInfo` struct from the raw `#~` stream data.
    ///
    /// ## Arguments
    /// * 'data' - The `#~` stream, starting at its header
    /// * '`valid_bitvec`' - The valid bitvector from the header, showing which tables are present
    ///
    /// # Errors
    /// Returns an error if the data is insufficient or the bitvector uses a
    /// table this crate does not understand.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        if valid_bitvec & !KNOWN_TABLES != 0 {
            return Err(malformed_error!(
                "Valid bitvector 0x{:016X} uses unsupported tables",
                valid_bitvec
            ));
        }

        let mut table_rows =
            vec![TableRowInfo::default(); TableId::GenericParamConstraint as usize + 1];
        let mut next_row_offset = 24;

        for table_id in TableId::iter() {
            if data.len() < next_row_offset {
                return Err(out_of_bounds_error!());
            }

            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            if row_count == 0 {
                // Empty tables should be omitted during compilation and not be present in a valid sample
                continue;
            }

            table_rows[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;

        Ok(TableInfo {
            rows: table_rows,
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        })
    }

    #[cfg(test)]
    /// Special constructor for unit-tests
    ///
    /// ## Arguments
    /// * 'valid_tables' - A slice of tuples providing (table_id, row_count) of the valid tables
    /// * 'large_str'    - Specify if the #Strings heap indexes are 4 or 2 bytes
    /// * 'large_blob'   - Specify if the #Blob heap indexes are 4 or 2 bytes
    /// * 'large_guid'   - Specify if the #GUID heap indexes are 4 or 2 bytes
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::GenericParamConstraint as usize + 1],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for valid_table in valid_tables {
            table_info.rows[valid_table.0 as usize] = TableRowInfo::new(valid_table.1);
        }

        table_info
    }

    /// Indicates the size of indexes into the '#Strings' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Indicates the size of indexes into the '#GUID' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Indicates the size of indexes into the '#Blob' heap. True means 4 bytes, False is 2 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Returns the size of a '#Strings' heap index in bytes
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Returns the size of a '#GUID' heap index in bytes
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Returns the size of a '#Blob' heap index in bytes
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Returns the metadata for a specific table.
    ///
    /// # Arguments
    /// * `table` - The `TableId` for which to retrieve metadata
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Returns the number of bits required to represent an index into a specific table.
    ///
    /// # Arguments
    /// * `table_id` - The `TableId` for which to calculate the index size
    #[must_use]
    pub fn table_index_bits(&self, table_id: TableId) -> u8 {
        self.rows[table_id as usize].bits
    }

    /// Returns the number of bytes required to represent an index into a specific table.
    ///
    /// # Arguments
    /// * `table_id` - The `TableId` for which to calculate the index size
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the number of bits required for a specific coded index type.
    ///
    /// # Arguments
    /// * `coded_index_type` - The `CodedIndexType` for which to calculate the size
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        let tables = coded_index_type.tables();
        let max_bits = tables
            .iter()
            .map(|table| self.table_index_bits(*table))
            .max()
            .unwrap_or(1);

        // Safe cast: tables.len() is limited by the enum size, log2 result is small
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let tag_bits = (tables.len() as f32).log2().ceil() as u8;
        max_bits + tag_bits
    }

    /// Returns the byte size for a specific coded index reference.
    ///
    /// # Arguments
    /// * `coded_index_type` - The `CodedIndexType` for which to retrieve the size
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_index_bits(coded_index_type) > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the byte size of one row of the given table, ECMA-335 II.22.
    ///
    /// Fixed-width columns contribute their literal size; string/GUID/blob
    /// columns contribute the heap index width; table and coded index columns
    /// contribute the width derived from the row counts of their targets.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        let s = u32::from(self.str_bytes());
        let g = u32::from(self.guid_bytes());
        let b = u32::from(self.blob_bytes());
        let t = |id: TableId| u32::from(self.table_index_bytes(id));
        let c = |ci: CodedIndexType| u32::from(self.coded_index_bytes(ci));

        match table {
            TableId::Module => 2 + s + 3 * g,
            TableId::TypeRef => c(CodedIndexType::ResolutionScope) + 2 * s,
            TableId::TypeDef => {
                4 + 2 * s
                    + c(CodedIndexType::TypeDefOrRef)
                    + t(TableId::Field)
                    + t(TableId::MethodDef)
            }
            TableId::FieldPtr => t(TableId::Field),
            TableId::Field => 2 + s + b,
            TableId::MethodPtr => t(TableId::MethodDef),
            TableId::MethodDef => 8 + s + b + t(TableId::Param),
            TableId::ParamPtr => t(TableId::Param),
            TableId::Param => 4 + s,
            TableId::InterfaceImpl => t(TableId::TypeDef) + c(CodedIndexType::TypeDefOrRef),
            TableId::MemberRef => c(CodedIndexType::MemberRefParent) + s + b,
            TableId::Constant => 2 + c(CodedIndexType::HasConstant) + b,
            TableId::CustomAttribute => {
                c(CodedIndexType::HasCustomAttribute) + c(CodedIndexType::CustomAttributeType) + b
            }
            TableId::FieldMarshal => c(CodedIndexType::HasFieldMarshal) + b,
            TableId::DeclSecurity => 2 + c(CodedIndexType::HasDeclSecurity) + b,
            TableId::ClassLayout => 6 + t(TableId::TypeDef),
            TableId::FieldLayout => 4 + t(TableId::Field),
            TableId::StandAloneSig => b,
            TableId::EventMap => t(TableId::TypeDef) + t(TableId::Event),
            TableId::EventPtr => t(TableId::Event),
            TableId::Event => 2 + s + c(CodedIndexType::TypeDefOrRef),
            TableId::PropertyMap => t(TableId::TypeDef) + t(TableId::Property),
            TableId::PropertyPtr => t(TableId::Property),
            TableId::Property => 2 + s + b,
            TableId::MethodSemantics => {
                2 + t(TableId::MethodDef) + c(CodedIndexType::HasSemantics)
            }
            TableId::MethodImpl => t(TableId::TypeDef) + 2 * c(CodedIndexType::MethodDefOrRef),
            TableId::ModuleRef => s,
            TableId::TypeSpec => b,
            TableId::ImplMap => {
                2 + c(CodedIndexType::MemberForwarded) + s + t(TableId::ModuleRef)
            }
            TableId::FieldRVA => 4 + t(TableId::Field),
            TableId::Assembly => 16 + b + 2 * s,
            TableId::AssemblyProcessor => 4,
            TableId::AssemblyOS => 12,
            TableId::AssemblyRef => 12 + 2 * b + 2 * s,
            TableId::AssemblyRefProcessor => 4 + t(TableId::AssemblyRef),
            TableId::AssemblyRefOS => 12 + t(TableId::AssemblyRef),
            TableId::File => 4 + s + b,
            TableId::ExportedType => 8 + 2 * s + c(CodedIndexType::Implementation),
            TableId::ManifestResource => 8 + s + c(CodedIndexType::Implementation),
            TableId::NestedClass => 2 * t(TableId::TypeDef),
            TableId::GenericParam => 4 + c(CodedIndexType::TypeOrMethodDef) + s,
            TableId::MethodSpec => c(CodedIndexType::MethodDefOrRef) + b,
            TableId::GenericParamConstraint => {
                t(TableId::GenericParam) + c(CodedIndexType::TypeDefOrRef)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_heap_row_sizes() {
        let info = TableInfo::new_test(
            &[(TableId::Module, 1), (TableId::Assembly, 1)],
            false,
            false,
            false,
        );

        assert_eq!(info.row_size(TableId::Module), 10); // 2 + 2 + 3*2
        assert_eq!(info.row_size(TableId::Assembly), 22); // 16 + 2 + 2*2
        assert_eq!(info.row_size(TableId::ModuleRef), 2);
        assert_eq!(info.row_size(TableId::TypeRef), 2 + 4); // coded + 2 strings
    }

    #[test]
    fn large_heap_row_sizes() {
        let info = TableInfo::new_test(&[(TableId::Assembly, 1)], true, true, true);

        assert_eq!(info.row_size(TableId::Module), 16); // 2 + 4 + 3*4
        assert_eq!(info.row_size(TableId::Assembly), 28); // 16 + 4 + 2*4
    }

    #[test]
    fn simple_index_grows_past_u16() {
        let small = TableInfo::new_test(&[(TableId::Field, 0xFFFF)], false, false, false);
        assert_eq!(small.table_index_bytes(TableId::Field), 2);
        assert_eq!(small.row_size(TableId::FieldPtr), 2);

        let large = TableInfo::new_test(&[(TableId::Field, 0x10000)], false, false, false);
        assert_eq!(large.table_index_bytes(TableId::Field), 4);
        assert_eq!(large.row_size(TableId::FieldPtr), 4);
    }

    #[test]
    fn coded_index_grows_with_tag_bits() {
        // HasCustomAttribute spends 5 bits on the tag, so 2^11 rows already
        // force the wide encoding while a 2-bit family still fits in 16 bits.
        let info = TableInfo::new_test(&[(TableId::TypeDef, 0x800)], false, false, false);

        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);
        assert_eq!(info.coded_index_bytes(CodedIndexType::HasCustomAttribute), 4);
    }

    #[test]
    fn unknown_valid_bits_are_rejected() {
        let data = vec![0_u8; 64];
        assert!(TableInfo::new(&data, 1_u64 << 0x1E).is_err());
        assert!(TableInfo::new(&data, 1_u64 << 0x30).is_err());
    }

    #[test]
    fn row_counts_are_read_positionally() {
        let mut data = vec![0_u8; 32];
        data[6] = 0x00; // heap size flags
        let valid: u64 = (1 << 0x00) | (1 << 0x20);
        data[24..28].copy_from_slice(&3_u32.to_le_bytes()); // Module rows
        data[28..32].copy_from_slice(&1_u32.to_le_bytes()); // Assembly rows

        let info = TableInfo::new(&data, valid).unwrap();
        assert_eq!(info.get(TableId::Module).rows, 3);
        assert_eq!(info.get(TableId::Assembly).rows, 1);
        assert_eq!(info.get(TableId::TypeDef).rows, 0);
    }
}
