//! Directory entries and the fixed 32-slot entry table.

use crate::error::{Error, Result};
use crate::layout::{self, entry_field as field};
use std::time::{SystemTime, UNIX_EPOCH};

/// One 64-byte directory record.
///
/// A slot whose name bytes are all zero is structurally unused. A slot
/// with a name and `flag == 1` is soft-deleted: the name and data bytes
/// stay in place, and the slot is only released by defragmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// UTF-8 name, zero-terminated and zero-padded to 32 bytes.
    pub name: [u8; layout::NAME_SIZE],
    /// Byte offset of the blob in the image.
    pub start: u32,
    /// Blob length in bytes, excluding alignment padding.
    pub length: u32,
    /// Reserved content-type tag, always 0.
    pub kind: u8,
    /// 0 = active, 1 = soft-deleted.
    pub flag: u8,
    /// Insertion time, seconds since the epoch.
    pub created: u64,
}

impl Entry {
    /// The all-zero record marking an unused slot.
    pub const EMPTY: Entry = Entry {
        name: [0; layout::NAME_SIZE],
        start: 0,
        length: 0,
        kind: 0,
        flag: layout::ENTRY_ACTIVE,
        created: 0,
    };

    /// Create an active entry for a freshly inserted blob, stamped with
    /// the current time.
    pub fn new(name: &str, start: u32, length: u32) -> Result<Self> {
        Ok(Self {
            name: encode_name(name)?,
            start,
            length,
            kind: 0,
            flag: layout::ENTRY_ACTIVE,
            created: current_timestamp(),
        })
    }

    /// Whether this slot is structurally unused (all-zero name).
    pub fn is_empty(&self) -> bool {
        self.name.iter().all(|&b| b == 0)
    }

    /// Whether this entry is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.flag == layout::ENTRY_DELETED
    }

    /// Whether this entry names a live file.
    pub fn is_active(&self) -> bool {
        !self.is_empty() && !self.is_deleted()
    }

    /// The stored name up to its zero terminator.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(layout::NAME_SIZE);
        &self.name[..end]
    }

    /// Exact name comparison against a candidate.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    /// The stored name as text.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// Serialize to the fixed 64-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; layout::ENTRY_SIZE] {
        let mut buf = [0u8; layout::ENTRY_SIZE];

        buf[field::NAME..field::NAME + layout::NAME_SIZE].copy_from_slice(&self.name);
        buf[field::START..field::START + 4].copy_from_slice(&self.start.to_le_bytes());
        buf[field::LENGTH..field::LENGTH + 4].copy_from_slice(&self.length.to_le_bytes());
        buf[field::KIND] = self.kind;
        buf[field::FLAG] = self.flag;
        buf[field::CREATED..field::CREATED + 8].copy_from_slice(&self.created.to_le_bytes());

        buf
    }

    /// Deserialize an entry record read from disk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < layout::ENTRY_SIZE {
            return Err(Error::InvalidLayout(format!(
                "entry record is {} bytes, expected {}",
                bytes.len(),
                layout::ENTRY_SIZE
            )));
        }

        let mut name = [0u8; layout::NAME_SIZE];
        name.copy_from_slice(&bytes[field::NAME..field::NAME + layout::NAME_SIZE]);

        Ok(Self {
            name,
            start: u32::from_le_bytes([
                bytes[field::START],
                bytes[field::START + 1],
                bytes[field::START + 2],
                bytes[field::START + 3],
            ]),
            length: u32::from_le_bytes([
                bytes[field::LENGTH],
                bytes[field::LENGTH + 1],
                bytes[field::LENGTH + 2],
                bytes[field::LENGTH + 3],
            ]),
            kind: bytes[field::KIND],
            flag: bytes[field::FLAG],
            created: u64::from_le_bytes([
                bytes[field::CREATED],
                bytes[field::CREATED + 1],
                bytes[field::CREATED + 2],
                bytes[field::CREATED + 3],
                bytes[field::CREATED + 4],
                bytes[field::CREATED + 5],
                bytes[field::CREATED + 6],
                bytes[field::CREATED + 7],
            ]),
        })
    }
}

/// The fixed array of 32 directory slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTable {
    slots: [Entry; layout::ENTRY_CAPACITY],
}

impl EntryTable {
    /// A table of 32 unused slots, as written by format.
    pub fn empty() -> Self {
        Self {
            slots: [Entry::EMPTY; layout::ENTRY_CAPACITY],
        }
    }

    pub fn get(&self, slot: usize) -> &Entry {
        &self.slots[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Entry {
        &mut self.slots[slot]
    }

    pub fn set(&mut self, slot: usize, entry: Entry) {
        self.slots[slot] = entry;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.slots.iter()
    }

    /// Find a non-empty slot by exact name, regardless of its deletion
    /// flag.
    pub fn find_named(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|e| !e.is_empty() && e.name_matches(name))
    }

    /// Find a live entry by exact name, skipping soft-deleted slots.
    pub fn find_active(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|e| e.is_active() && e.name_matches(name))
    }

    /// First structurally empty slot at or after `from`, scanning
    /// forward only. Soft-deleted slots are never candidates.
    pub fn first_empty_from(&self, from: usize) -> Option<usize> {
        (from..layout::ENTRY_CAPACITY).find(|&i| self.slots[i].is_empty())
    }

    /// Whether any slot in the table is still unused.
    pub fn has_empty_slot(&self) -> bool {
        self.slots.iter().any(Entry::is_empty)
    }

    /// File-relative byte offset of a slot.
    pub fn slot_offset(slot: usize) -> u32 {
        layout::FILE_TABLE_OFFSET + (slot * layout::ENTRY_SIZE) as u32
    }

    /// Map a file-relative byte offset back to a slot index. Returns
    /// `None` for offsets outside the table or not on a slot boundary.
    pub fn slot_for_offset(offset: u32) -> Option<usize> {
        if offset < layout::FILE_TABLE_OFFSET {
            return None;
        }
        let rel = (offset - layout::FILE_TABLE_OFFSET) as usize;
        if rel % layout::ENTRY_SIZE != 0 {
            return None;
        }
        let slot = rel / layout::ENTRY_SIZE;
        (slot < layout::ENTRY_CAPACITY).then_some(slot)
    }

    /// Serialize all 32 slots to their on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(layout::TABLE_SIZE);
        for entry in &self.slots {
            buf.extend_from_slice(&entry.to_bytes());
        }
        buf
    }

    /// Deserialize a full table read from disk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < layout::TABLE_SIZE {
            return Err(Error::InvalidLayout(format!(
                "entry table is {} bytes, expected {}",
                bytes.len(),
                layout::TABLE_SIZE
            )));
        }

        let mut table = Self::empty();
        for slot in 0..layout::ENTRY_CAPACITY {
            let at = slot * layout::ENTRY_SIZE;
            table.slots[slot] = Entry::from_bytes(&bytes[at..at + layout::ENTRY_SIZE])?;
        }
        Ok(table)
    }
}

/// Encode a name into the fixed 32-byte field, zero-padded.
pub fn encode_name(name: &str) -> Result<[u8; layout::NAME_SIZE]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.contains(&0) {
        return Err(Error::InvalidName(name.to_string()));
    }
    if bytes.len() > layout::MAX_NAME_LEN {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            max: layout::MAX_NAME_LEN,
        });
    }

    let mut encoded = [0u8; layout::NAME_SIZE];
    encoded[..bytes.len()].copy_from_slice(bytes);
    Ok(encoded)
}

/// Get current Unix timestamp.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
