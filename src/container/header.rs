//! Image header - the root metadata record.

use crate::error::{Error, Result};
use crate::layout::{self, header_field as field};

/// The fixed 64-byte header at offset 0 of every image.
///
/// Reserved padding regions are not represented; they serialize as
/// zeros and are ignored on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Magic tag identifying the format.
    pub magic: [u8; 8],
    /// Format version.
    pub version: u8,
    /// 0 while free entry slots remain, 1 once the table is full.
    pub flags: u8,
    /// Number of active (non-deleted) files.
    pub file_count: u16,
    /// Total slots in the entry table.
    pub file_capacity: u16,
    /// Size of one entry record.
    pub entry_size: u16,
    /// Byte offset of the entry table.
    pub file_table_offset: u32,
    /// Byte offset where the data region begins.
    pub data_start_offset: u32,
    /// Append point for the next inserted blob.
    pub next_free_offset: u32,
    /// Byte offset of the next directory slot to try on insertion.
    pub free_entry_offset: u32,
    /// Count of soft-deleted entries still holding slots.
    pub deleted_files: u16,
}

impl Header {
    /// Create the header of a freshly formatted, empty image.
    pub fn new() -> Self {
        Self {
            magic: layout::MAGIC,
            version: layout::VERSION,
            flags: layout::TABLE_HAS_FREE,
            file_count: 0,
            file_capacity: layout::ENTRY_CAPACITY as u16,
            entry_size: layout::ENTRY_SIZE as u16,
            file_table_offset: layout::FILE_TABLE_OFFSET,
            data_start_offset: layout::DATA_START_OFFSET,
            next_free_offset: layout::DATA_START_OFFSET,
            free_entry_offset: layout::FILE_TABLE_OFFSET,
            deleted_files: 0,
        }
    }

    /// Validate magic, version and the fixed-layout fields.
    pub fn validate(&self) -> Result<()> {
        if self.magic != layout::MAGIC {
            return Err(Error::InvalidMagic);
        }
        if self.version != layout::VERSION {
            return Err(Error::UnsupportedVersion {
                expected: layout::VERSION,
                found: self.version,
            });
        }
        if self.file_capacity != layout::ENTRY_CAPACITY as u16 {
            return Err(Error::InvalidLayout(format!(
                "entry capacity is {}, expected {}",
                self.file_capacity,
                layout::ENTRY_CAPACITY
            )));
        }
        if self.entry_size != layout::ENTRY_SIZE as u16 {
            return Err(Error::InvalidLayout(format!(
                "entry size is {}, expected {}",
                self.entry_size,
                layout::ENTRY_SIZE
            )));
        }
        if self.file_table_offset != layout::FILE_TABLE_OFFSET
            || self.data_start_offset != layout::DATA_START_OFFSET
        {
            return Err(Error::InvalidLayout(format!(
                "region offsets {}/{} do not match the fixed layout",
                self.file_table_offset, self.data_start_offset
            )));
        }
        if u32::from(self.file_count) + u32::from(self.deleted_files) > u32::from(self.file_capacity)
        {
            return Err(Error::InvalidLayout(format!(
                "{} active + {} deleted entries exceed capacity {}",
                self.file_count, self.deleted_files, self.file_capacity
            )));
        }
        if self.next_free_offset < self.data_start_offset {
            return Err(Error::InvalidLayout(format!(
                "append point {} lies before the data region at {}",
                self.next_free_offset, self.data_start_offset
            )));
        }
        Ok(())
    }

    /// Entry slots still open for new files. Slots held by deleted
    /// entries do not count until a defragmentation pass frees them.
    pub fn free_slots(&self) -> u16 {
        self.file_capacity
            .saturating_sub(self.file_count)
            .saturating_sub(self.deleted_files)
    }

    /// Bytes of the data region currently in use, padding included.
    pub fn used_data(&self) -> u32 {
        self.next_free_offset.saturating_sub(self.data_start_offset)
    }

    /// Serialize to the fixed 64-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; layout::HEADER_SIZE] {
        let mut buf = [0u8; layout::HEADER_SIZE];

        buf[field::MAGIC..field::MAGIC + 8].copy_from_slice(&self.magic);
        buf[field::VERSION] = self.version;
        buf[field::FLAGS] = self.flags;
        buf[field::FILE_COUNT..field::FILE_COUNT + 2]
            .copy_from_slice(&self.file_count.to_le_bytes());
        buf[field::FILE_CAPACITY..field::FILE_CAPACITY + 2]
            .copy_from_slice(&self.file_capacity.to_le_bytes());
        buf[field::ENTRY_SIZE..field::ENTRY_SIZE + 2]
            .copy_from_slice(&self.entry_size.to_le_bytes());
        buf[field::FILE_TABLE_OFFSET..field::FILE_TABLE_OFFSET + 4]
            .copy_from_slice(&self.file_table_offset.to_le_bytes());
        buf[field::DATA_START_OFFSET..field::DATA_START_OFFSET + 4]
            .copy_from_slice(&self.data_start_offset.to_le_bytes());
        buf[field::NEXT_FREE_OFFSET..field::NEXT_FREE_OFFSET + 4]
            .copy_from_slice(&self.next_free_offset.to_le_bytes());
        buf[field::FREE_ENTRY_OFFSET..field::FREE_ENTRY_OFFSET + 4]
            .copy_from_slice(&self.free_entry_offset.to_le_bytes());
        buf[field::DELETED_FILES..field::DELETED_FILES + 2]
            .copy_from_slice(&self.deleted_files.to_le_bytes());

        buf
    }

    /// Deserialize and validate a header read from disk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < layout::HEADER_SIZE {
            return Err(Error::TruncatedImage {
                expected: layout::HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[field::MAGIC..field::MAGIC + 8]);

        let header = Self {
            magic,
            version: bytes[field::VERSION],
            flags: bytes[field::FLAGS],
            file_count: u16::from_le_bytes([
                bytes[field::FILE_COUNT],
                bytes[field::FILE_COUNT + 1],
            ]),
            file_capacity: u16::from_le_bytes([
                bytes[field::FILE_CAPACITY],
                bytes[field::FILE_CAPACITY + 1],
            ]),
            entry_size: u16::from_le_bytes([
                bytes[field::ENTRY_SIZE],
                bytes[field::ENTRY_SIZE + 1],
            ]),
            file_table_offset: u32::from_le_bytes([
                bytes[field::FILE_TABLE_OFFSET],
                bytes[field::FILE_TABLE_OFFSET + 1],
                bytes[field::FILE_TABLE_OFFSET + 2],
                bytes[field::FILE_TABLE_OFFSET + 3],
            ]),
            data_start_offset: u32::from_le_bytes([
                bytes[field::DATA_START_OFFSET],
                bytes[field::DATA_START_OFFSET + 1],
                bytes[field::DATA_START_OFFSET + 2],
                bytes[field::DATA_START_OFFSET + 3],
            ]),
            next_free_offset: u32::from_le_bytes([
                bytes[field::NEXT_FREE_OFFSET],
                bytes[field::NEXT_FREE_OFFSET + 1],
                bytes[field::NEXT_FREE_OFFSET + 2],
                bytes[field::NEXT_FREE_OFFSET + 3],
            ]),
            free_entry_offset: u32::from_le_bytes([
                bytes[field::FREE_ENTRY_OFFSET],
                bytes[field::FREE_ENTRY_OFFSET + 1],
                bytes[field::FREE_ENTRY_OFFSET + 2],
                bytes[field::FREE_ENTRY_OFFSET + 3],
            ]),
            deleted_files: u16::from_le_bytes([
                bytes[field::DELETED_FILES],
                bytes[field::DELETED_FILES + 1],
            ]),
        };

        header.validate()?;
        Ok(header)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header() {
        let header = Header::new();

        assert_eq!(header.magic, layout::MAGIC);
        assert_eq!(header.version, layout::VERSION);
        assert_eq!(header.file_count, 0);
        assert_eq!(header.next_free_offset, layout::DATA_START_OFFSET);
        assert_eq!(header.free_entry_offset, layout::FILE_TABLE_OFFSET);
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_field_positions_match_layout() {
        let mut header = Header::new();
        header.file_count = 0x0102;
        header.deleted_files = 0x0304;
        header.next_free_offset = 0x0A0B0C0D;
        header.free_entry_offset = 0x01020304;
        // Serialization places every field at its published offset.
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..8], b"ZVFSDSK1");
        assert_eq!(bytes[8], 1);
        assert_eq!(bytes[9], 0);
        assert_eq!(&bytes[12..14], &[0x02, 0x01]);
        assert_eq!(&bytes[14..16], &[32, 0]);
        assert_eq!(&bytes[16..18], &[64, 0]);
        assert_eq!(&bytes[20..24], &64u32.to_le_bytes());
        assert_eq!(&bytes[24..28], &2112u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&bytes[32..36], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[36..38], &[0x04, 0x03]);
        // Reserved regions stay zeroed.
        assert_eq!(&bytes[10..12], &[0, 0]);
        assert_eq!(&bytes[18..20], &[0, 0]);
        assert_eq!(&bytes[38..64], &[0u8; 26]);
    }

    #[test]
    fn test_round_trip() {
        let mut header = Header::new();
        header.file_count = 7;
        header.deleted_files = 3;
        header.flags = layout::TABLE_HAS_FREE;
        header.next_free_offset = 4000;
        header.free_entry_offset = layout::FILE_TABLE_OFFSET + 6 * layout::ENTRY_SIZE as u32;

        let restored = Header::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut header = Header::new();
        header.magic = *b"NOTANIMG";

        assert!(matches!(header.validate(), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut header = Header::new();
        header.version = 9;

        assert!(matches!(
            header.validate(),
            Err(Error::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn test_counters_exceeding_capacity_rejected() {
        let mut header = Header::new();
        header.file_count = 20;
        header.deleted_files = 20;

        assert!(matches!(header.validate(), Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let result = Header::from_bytes(&[0u8; 10]);
        assert!(matches!(result, Err(Error::TruncatedImage { .. })));
    }

    #[test]
    fn test_free_slots() {
        let mut header = Header::new();
        assert_eq!(header.free_slots(), 32);

        header.file_count = 10;
        header.deleted_files = 4;
        assert_eq!(header.free_slots(), 18);
    }
}
