//! On-disk layout constants for the container image format.
//!
//! The image is a single file: a 64-byte header, a fixed table of 32
//! 64-byte directory entries, then the data region. All multi-byte
//! integers are little-endian.

/// Size of the image header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Size of one directory entry in bytes.
pub const ENTRY_SIZE: usize = 64;

/// Number of directory slots in the entry table.
pub const ENTRY_CAPACITY: usize = 32;

/// Total size of the entry table in bytes.
pub const TABLE_SIZE: usize = ENTRY_CAPACITY * ENTRY_SIZE;

/// Magic tag stored at offset 0 of every image.
pub const MAGIC: [u8; 8] = *b"ZVFSDSK1";

/// Current format version.
pub const VERSION: u8 = 1;

/// Alignment of blob starts within the data region. Every blob is
/// followed by zero padding up to the next multiple of this.
pub const ALIGNMENT: u64 = 64;

/// Size of the name field inside an entry.
pub const NAME_SIZE: usize = 32;

/// Longest stored name in bytes. One byte of the name field is kept
/// for the zero terminator.
pub const MAX_NAME_LEN: usize = NAME_SIZE - 1;

/// Byte offset of the entry table (directly after the header).
pub const FILE_TABLE_OFFSET: u32 = HEADER_SIZE as u32;

/// Byte offset where the data region begins.
pub const DATA_START_OFFSET: u32 = (HEADER_SIZE + TABLE_SIZE) as u32;

/// Hard ceiling on the total image size. The header and entry offset
/// fields are 4 bytes wide, so nothing past 4 GiB is addressable.
pub const MAX_IMAGE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Header `flags` value while free entry slots remain.
pub const TABLE_HAS_FREE: u8 = 0;

/// Header `flags` value once every slot is occupied.
pub const TABLE_FULL: u8 = 1;

/// Entry `flag` value for a live file.
pub const ENTRY_ACTIVE: u8 = 0;

/// Entry `flag` value for a soft-deleted file.
pub const ENTRY_DELETED: u8 = 1;

/// Field offsets within the 64-byte header.
pub mod header_field {
    /// 8 bytes, ASCII magic tag.
    pub const MAGIC: usize = 0;
    /// 1 byte, format version.
    pub const VERSION: usize = 8;
    /// 1 byte, 0 = free slots exist, 1 = table full.
    pub const FLAGS: usize = 9;
    /// 2 bytes, zero padding.
    pub const RESERVED0: usize = 10;
    /// 2 bytes, number of active (non-deleted) files.
    pub const FILE_COUNT: usize = 12;
    /// 2 bytes, total slots in the entry table.
    pub const FILE_CAPACITY: usize = 14;
    /// 2 bytes, size of one entry record.
    pub const ENTRY_SIZE: usize = 16;
    /// 2 bytes, zero padding.
    pub const RESERVED1: usize = 18;
    /// 4 bytes, byte offset of the entry table.
    pub const FILE_TABLE_OFFSET: usize = 20;
    /// 4 bytes, byte offset where the data region begins.
    pub const DATA_START_OFFSET: usize = 24;
    /// 4 bytes, append point for the next inserted blob.
    pub const NEXT_FREE_OFFSET: usize = 28;
    /// 4 bytes, byte offset of the next slot to try on insertion.
    pub const FREE_ENTRY_OFFSET: usize = 32;
    /// 2 bytes, count of soft-deleted entries still holding slots.
    pub const DELETED_FILES: usize = 36;
    /// 26 bytes, zero padding up to 64.
    pub const RESERVED2: usize = 38;
}

/// Field offsets within one 64-byte directory entry.
pub mod entry_field {
    /// 32 bytes, UTF-8 name, zero-terminated and zero-padded.
    pub const NAME: usize = 0;
    /// 4 bytes, byte offset of the blob in the image.
    pub const START: usize = 32;
    /// 4 bytes, blob length without alignment padding.
    pub const LENGTH: usize = 36;
    /// 1 byte, reserved content-type tag.
    pub const KIND: usize = 40;
    /// 1 byte, 0 = active, 1 = soft-deleted.
    pub const FLAG: usize = 41;
    /// 2 bytes, zero padding.
    pub const RESERVED: usize = 42;
    /// 8 bytes, insertion time in seconds since the epoch.
    pub const CREATED: usize = 44;
    /// 12 bytes, zero padding up to 64.
    pub const TAIL: usize = 52;
}
