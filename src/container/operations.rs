//! Container operations - the main interface.

use crate::container::data;
use crate::container::entry::{Entry, EntryTable};
use crate::container::header::Header;
use crate::error::{Error, Result};
use crate::layout;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Stored name.
    pub name: String,
    /// Blob length in bytes, without alignment padding.
    pub length: u32,
    /// Insertion time, seconds since the epoch.
    pub created: u64,
}

/// Summary reported by [`Container::inspect`].
#[derive(Debug, Clone)]
pub struct ContainerStats {
    /// Path of the backing file.
    pub path: PathBuf,
    /// Active (non-deleted) files.
    pub file_count: u16,
    /// Slots still open for new files.
    pub free_slots: u16,
    /// Soft-deleted entries still holding slots.
    pub deleted_files: u16,
    /// Total on-disk size of the backing file, from the filesystem.
    pub disk_size: u64,
}

/// Outcome of a defragmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefragReport {
    /// Soft-deleted entries purged from the table.
    pub purged: usize,
    /// Bytes the image shrank by, floored at zero.
    pub freed_bytes: u64,
}

/// A container image opened for one operation.
///
/// The header and the full entry table are loaded on open and written
/// back as whole units by every mutating operation. The backing file is
/// held only for the lifetime of this value and released on drop,
/// error paths included. Nothing is shared between operations.
pub struct Container {
    path: PathBuf,
    file: File,
    header: Header,
    table: EntryTable,
}

impl Container {
    /// Create or overwrite an image at `path`: a fresh header plus 32
    /// zeroed entry slots, no data region yet. The resulting file is
    /// exactly header + table in size.
    pub fn format(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let header = Header::new();
        let table = EntryTable::empty();

        data::write_at(&mut file, 0, &header.to_bytes())?;
        data::write_at(
            &mut file,
            u64::from(header.file_table_offset),
            &table.to_bytes(),
        )?;
        file.sync_all()?;

        debug!(path = %path.display(), "formatted new image");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            table,
        })
    }

    /// Open an existing image read-only.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, false)
    }

    /// Open an existing image for a mutating operation.
    pub fn open_rw(path: &Path) -> Result<Self> {
        Self::open_with(path, true)
    }

    fn open_with(path: &Path, writable: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if writable {
            options.write(true);
        }
        let mut file = options.open(path)?;

        let disk_size = file.metadata()?.len();
        if disk_size < layout::HEADER_SIZE as u64 {
            return Err(Error::TruncatedImage {
                expected: layout::HEADER_SIZE as u64,
                actual: disk_size,
            });
        }

        let header_bytes = data::read_at(&mut file, 0, layout::HEADER_SIZE)?;
        let header = Header::from_bytes(&header_bytes)?;

        let table_bytes = data::read_at(
            &mut file,
            u64::from(header.file_table_offset),
            layout::TABLE_SIZE,
        )?;
        let table = EntryTable::from_bytes(&table_bytes)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            table,
        })
    }

    /// Report image statistics without touching the entry table or
    /// data region. Reads only the header, plus the on-disk size from
    /// filesystem metadata.
    pub fn inspect(path: &Path) -> Result<ContainerStats> {
        let mut file = File::open(path)?;

        let disk_size = file.metadata()?.len();
        if disk_size < layout::HEADER_SIZE as u64 {
            return Err(Error::TruncatedImage {
                expected: layout::HEADER_SIZE as u64,
                actual: disk_size,
            });
        }

        let header = Header::from_bytes(&data::read_at(&mut file, 0, layout::HEADER_SIZE)?)?;

        Ok(ContainerStats {
            path: path.to_path_buf(),
            file_count: header.file_count,
            free_slots: header.free_slots(),
            deleted_files: header.deleted_files,
            disk_size,
        })
    }

    /// Insert `content` under `name`.
    ///
    /// The blob is appended at the current append point and padded to
    /// the next 64-byte boundary; the entry lands in the first
    /// structurally empty slot at or after the header's slot hint.
    /// Slots of soft-deleted files are not reused; they stay reserved
    /// until a defragmentation pass. All checks run before anything is
    /// written, so a rejected insert leaves the image untouched.
    pub fn insert(&mut self, name: &str, content: &[u8]) -> Result<()> {
        if self.table.find_named(name).is_some() {
            return Err(Error::NameExists(name.to_string()));
        }
        if self.header.flags == layout::TABLE_FULL {
            return Err(Error::TableFull);
        }

        let hint =
            EntryTable::slot_for_offset(self.header.free_entry_offset).ok_or(Error::NoFreeSlot)?;
        let slot = self.table.first_empty_from(hint).ok_or(Error::NoFreeSlot)?;

        let length = content.len() as u64;
        let padded = length + data::padding_for(length);
        let new_next_free = u64::from(self.header.next_free_offset) + padded;
        if new_next_free > layout::MAX_IMAGE_SIZE {
            return Err(Error::SizeLimitExceeded {
                needed: new_next_free,
                limit: layout::MAX_IMAGE_SIZE,
            });
        }

        let start = self.header.next_free_offset;
        let entry = Entry::new(name, start, length as u32)?;
        self.table.set(slot, entry);

        self.header.file_count += 1;
        self.header.next_free_offset = new_next_free as u32;
        self.header.free_entry_offset = EntryTable::slot_offset(slot);
        self.header.flags = if self.table.has_empty_slot() {
            layout::TABLE_HAS_FREE
        } else {
            layout::TABLE_FULL
        };

        // Metadata first, then the appended blob, then the exact size.
        self.write_metadata()?;
        data::write_padded(&mut self.file, u64::from(start), content)?;
        self.file.set_len(u64::from(self.header.next_free_offset))?;
        self.file.sync_all()?;

        debug!(name, bytes = content.len(), slot, start, "inserted file");
        Ok(())
    }

    /// Read back the exact bytes stored under `name`.
    ///
    /// Matches by name alone, soft-deleted entries included: until a
    /// defragmentation pass their data is still present and
    /// addressable.
    pub fn fetch(&mut self, name: &str) -> Result<Vec<u8>> {
        let slot = self
            .table
            .find_named(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        let entry = *self.table.get(slot);

        data::read_at(&mut self.file, u64::from(entry.start), entry.length as usize)
    }

    /// Soft-delete the entry stored under `name`.
    ///
    /// Matches by name alone, like [`fetch`](Self::fetch). Only the
    /// entry flag and the header counters change; the data region is
    /// left byte-for-byte intact.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let slot = self
            .table
            .find_named(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        self.table.get_mut(slot).flag = layout::ENTRY_DELETED;
        self.header.file_count = self.header.file_count.saturating_sub(1);
        self.header.deleted_files += 1;

        self.write_metadata()?;
        self.file.sync_all()?;

        debug!(name, slot, "marked file as deleted");
        Ok(())
    }

    /// List all active files in slot order.
    pub fn list(&self) -> Vec<FileInfo> {
        self.table
            .iter()
            .filter(|e| e.is_active())
            .map(|e| FileInfo {
                name: e.name(),
                length: e.length,
                created: e.created,
            })
            .collect()
    }

    /// Return the content stored under `name` as text.
    ///
    /// Unlike [`fetch`](Self::fetch), only active entries match here;
    /// a soft-deleted file is reported as not found.
    pub fn dump(&mut self, name: &str) -> Result<String> {
        let slot = self
            .table
            .find_active(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        let entry = *self.table.get(slot);

        let content = data::read_at(&mut self.file, u64::from(entry.start), entry.length as usize)?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    /// Purge soft-deleted entries and repack the data region.
    ///
    /// Active entries keep their relative table order but move to the
    /// lowest slots, and their blobs are packed contiguously (with the
    /// usual per-blob trailing padding) from the start of the data
    /// region. The backing file is truncated to the new exact size.
    pub fn defragment(&mut self) -> Result<DefragReport> {
        let old_next_free = self.header.next_free_offset;
        let data_start = self.header.data_start_offset;

        let occupied = old_next_free.saturating_sub(data_start) as usize;
        let span = if occupied > 0 {
            data::read_at(&mut self.file, u64::from(data_start), occupied)?
        } else {
            Vec::new()
        };

        let mut survivors: Vec<(Entry, Vec<u8>)> = Vec::new();
        let mut purged = 0usize;
        for entry in self.table.iter() {
            if entry.is_empty() {
                continue;
            }
            if entry.is_deleted() {
                purged += 1;
                continue;
            }

            let rel = entry.start.saturating_sub(data_start) as usize;
            let len = entry.length as usize;
            // An extent pointing outside the loaded span yields zeros
            // rather than aborting the whole pass.
            let blob = rel
                .checked_add(len)
                .and_then(|end| span.get(rel..end))
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| vec![0u8; len]);
            survivors.push((*entry, blob));
        }

        let mut table = EntryTable::empty();
        let mut packed: Vec<u8> = Vec::with_capacity(occupied);
        let mut rel: u64 = 0;
        for (slot, (entry, blob)) in survivors.iter().enumerate() {
            let aligned = data::align_up(rel);
            if aligned as usize > packed.len() {
                packed.resize(aligned as usize, 0);
            }

            packed.extend_from_slice(blob);
            let padding = data::padding_for(blob.len() as u64);
            packed.resize(packed.len() + padding as usize, 0);
            rel = aligned + blob.len() as u64 + padding;

            let mut rebuilt = *entry;
            rebuilt.start = data_start + aligned as u32;
            rebuilt.flag = layout::ENTRY_ACTIVE;
            table.set(slot, rebuilt);
        }

        let new_next_free = u64::from(data_start) + rel;

        self.table = table;
        self.header.file_count = survivors.len() as u16;
        self.header.deleted_files = 0;
        self.header.next_free_offset = new_next_free as u32;
        if survivors.len() < layout::ENTRY_CAPACITY {
            self.header.free_entry_offset = EntryTable::slot_offset(survivors.len());
            self.header.flags = layout::TABLE_HAS_FREE;
        } else {
            self.header.free_entry_offset = 0;
            self.header.flags = layout::TABLE_FULL;
        }

        self.write_metadata()?;
        if !packed.is_empty() {
            data::write_at(&mut self.file, u64::from(data_start), &packed)?;
        }
        self.file.set_len(new_next_free)?;
        self.file.sync_all()?;

        let freed_bytes = u64::from(old_next_free.saturating_sub(new_next_free as u32));
        debug!(purged, freed_bytes, "defragmented image");

        Ok(DefragReport {
            purged,
            freed_bytes,
        })
    }

    /// The image header as currently loaded.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The entry table as currently loaded.
    pub fn table(&self) -> &EntryTable {
        &self.table
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the header and full entry table back as whole units.
    fn write_metadata(&mut self) -> Result<()> {
        data::write_at(&mut self.file, 0, &self.header.to_bytes())?;
        data::write_at(
            &mut self.file,
            u64::from(self.header.file_table_offset),
            &self.table.to_bytes(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_image(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("store.img");
        Container::format(&path).unwrap();
        path
    }

    #[test]
    fn test_format_writes_header_and_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, layout::DATA_START_OFFSET as u64);

        let container = Container::open(&path).unwrap();
        assert_eq!(container.header().file_count, 0);
        assert_eq!(container.header().deleted_files, 0);
        assert_eq!(container.header().flags, layout::TABLE_HAS_FREE);
        assert_eq!(
            container.header().next_free_offset,
            layout::DATA_START_OFFSET
        );
        assert!(container.table().iter().all(Entry::is_empty));
    }

    #[test]
    fn test_format_overwrites_existing_image() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("stale.txt", b"old contents").unwrap();
        drop(container);

        Container::format(&path).unwrap();
        let stats = Container::inspect(&path).unwrap();
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.disk_size, layout::DATA_START_OFFSET as u64);
    }

    #[test]
    fn test_insert_updates_header_accounting() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("a.txt", &[1u8; 100]).unwrap();

        let header = container.header();
        assert_eq!(header.file_count, 1);
        // 100 bytes pad out to 128.
        assert_eq!(header.next_free_offset, layout::DATA_START_OFFSET + 128);
        assert_eq!(header.free_entry_offset, EntryTable::slot_offset(0));
        assert_eq!(header.flags, layout::TABLE_HAS_FREE);

        container.insert("b.txt", &[2u8; 5]).unwrap();
        let header = container.header();
        assert_eq!(header.file_count, 2);
        assert_eq!(header.next_free_offset, layout::DATA_START_OFFSET + 192);
        assert_eq!(header.free_entry_offset, EntryTable::slot_offset(1));

        let second = container.table().get(1);
        assert_eq!(second.start, layout::DATA_START_OFFSET + 128);
        assert_eq!(second.length, 5);
    }

    #[test]
    fn test_insert_rejects_duplicate_even_if_deleted() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("x", b"one").unwrap();

        assert!(matches!(
            container.insert("x", b"two"),
            Err(Error::NameExists(_))
        ));

        container.delete("x").unwrap();
        assert!(matches!(
            container.insert("x", b"three"),
            Err(Error::NameExists(_))
        ));
    }

    #[test]
    fn test_deleted_slot_is_not_reused() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("first", b"1").unwrap();
        container.delete("first").unwrap();

        // The freed name is gone from listings, but its slot stays
        // reserved: the next insert lands in slot 1.
        container.insert("second", b"2").unwrap();
        assert!(container.table().get(0).is_deleted());
        assert!(container.table().get(1).is_active());
        assert_eq!(container.header().free_slots(), 30);
    }

    #[test]
    fn test_fetch_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let content: Vec<u8> = (0..200u16).map(|i| (i % 251) as u8).collect();
        let mut container = Container::open_rw(&path).unwrap();
        container.insert("blob.bin", &content).unwrap();
        drop(container);

        let mut container = Container::open(&path).unwrap();
        assert_eq!(container.fetch("blob.bin").unwrap(), content);
        assert!(matches!(
            container.fetch("missing"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_fetch_sees_deleted_dump_does_not() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("ghost.txt", b"still here").unwrap();
        container.delete("ghost.txt").unwrap();

        assert_eq!(container.fetch("ghost.txt").unwrap(), b"still here");
        assert!(matches!(
            container.dump("ghost.txt"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_dump_returns_text() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container
            .insert("note.txt", b"line one\nline two\n")
            .unwrap();

        assert_eq!(container.dump("note.txt").unwrap(), "line one\nline two\n");
    }

    #[test]
    fn test_delete_updates_counters_only() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("doomed", b"payload").unwrap();
        let next_free_before = container.header().next_free_offset;

        container.delete("doomed").unwrap();
        assert_eq!(container.header().file_count, 0);
        assert_eq!(container.header().deleted_files, 1);
        assert_eq!(container.header().next_free_offset, next_free_before);

        assert!(matches!(
            container.delete("missing"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_list_skips_empty_and_deleted() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        assert!(container.list().is_empty());

        container.insert("a", b"aaa").unwrap();
        container.insert("b", b"bb").unwrap();
        container.delete("a").unwrap();

        let listed = container.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "b");
        assert_eq!(listed[0].length, 2);
    }

    #[test]
    fn test_defragment_reclaims_deleted_space() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("keep1", &[1u8; 100]).unwrap();
        container.insert("drop", &[2u8; 300]).unwrap();
        container.insert("keep2", &[3u8; 64]).unwrap();
        container.delete("drop").unwrap();

        let report = container.defragment().unwrap();
        assert_eq!(report.purged, 1);
        // 300 bytes padded out to 320.
        assert_eq!(report.freed_bytes, 320);

        let header = container.header();
        assert_eq!(header.file_count, 2);
        assert_eq!(header.deleted_files, 0);
        assert_eq!(header.next_free_offset, layout::DATA_START_OFFSET + 192);
        assert_eq!(header.free_entry_offset, EntryTable::slot_offset(2));

        // Survivors keep their relative order and stay byte-identical.
        assert_eq!(container.fetch("keep1").unwrap(), vec![1u8; 100]);
        assert_eq!(container.fetch("keep2").unwrap(), vec![3u8; 64]);
        assert_eq!(container.table().get(0).name(), "keep1");
        assert_eq!(container.table().get(1).name(), "keep2");
        assert!(container.table().get(2).is_empty());

        // The file shrank to the packed size.
        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, (layout::DATA_START_OFFSET + 192) as u64);
    }

    #[test]
    fn test_defragment_empty_image_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        let report = container.defragment().unwrap();

        assert_eq!(report.purged, 0);
        assert_eq!(report.freed_bytes, 0);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            layout::DATA_START_OFFSET as u64
        );
    }

    #[test]
    fn test_defragment_releases_slots_for_reuse() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("a", b"a").unwrap();
        container.insert("b", b"b").unwrap();
        container.delete("a").unwrap();
        container.defragment().unwrap();

        // The purged name is insertable again, into the freed slot.
        container.insert("a", b"again").unwrap();
        assert_eq!(container.table().get(0).name(), "b");
        assert_eq!(container.table().get(1).name(), "a");
        assert_eq!(container.fetch("a").unwrap(), b"again");
    }

    #[test]
    fn test_inspect_reports_disk_size() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        container.insert("a", &[0u8; 10]).unwrap();
        drop(container);

        let stats = Container::inspect(&path).unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.free_slots, 31);
        assert_eq!(stats.deleted_files, 0);
        assert_eq!(stats.disk_size, (layout::DATA_START_OFFSET + 64) as u64);
    }

    #[test]
    fn test_inspect_rejects_short_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stub.img");
        std::fs::write(&path, b"too short").unwrap();

        assert!(matches!(
            Container::inspect(&path),
            Err(Error::TruncatedImage { .. })
        ));
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("random.bin");
        std::fs::write(&path, vec![0xFFu8; 4096]).unwrap();

        assert!(matches!(
            Container::open(&path),
            Err(Error::InvalidMagic)
        ));
    }

    #[test]
    fn test_table_full_after_capacity_inserts() {
        let dir = TempDir::new().unwrap();
        let path = new_image(&dir);

        let mut container = Container::open_rw(&path).unwrap();
        for i in 0..layout::ENTRY_CAPACITY {
            container.insert(&format!("file{i}"), b"x").unwrap();
        }
        assert_eq!(container.header().flags, layout::TABLE_FULL);

        let header_before = *container.header();
        let table_before = container.table().clone();

        assert!(matches!(
            container.insert("straw", b"y"),
            Err(Error::TableFull)
        ));
        assert_eq!(container.header(), &header_before);
        assert_eq!(container.table(), &table_before);
    }
}
