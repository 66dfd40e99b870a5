//! flatfs - a single-file container image with a flat namespace.
//!
//! One host file stores up to 32 named byte blobs behind a fixed
//! header and directory:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (64 bytes)                           │
//! │  - magic "ZVFSDSK1", version, flags         │
//! │  - counters and region offsets              │
//! ├─────────────────────────────────────────────┤
//! │ Entry table (32 × 64 bytes)                 │
//! │  - name, start, length, flag, created       │
//! ├─────────────────────────────────────────────┤
//! │ Data region (append-oriented)               │
//! │  - blob bytes, each padded to 64 bytes      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Removal is a soft delete: the entry
//! is flagged and its slot and data bytes stay in place until a
//! defragmentation pass rewrites the image with only the active files.
//! The format carries no journal; every operation loads the header and
//! entry table in full, mutates them in memory, and writes them back
//! as whole units.
//!
//! # Example
//!
//! ```rust,no_run
//! use flatfs::Container;
//! use std::path::Path;
//!
//! let path = Path::new("store.img");
//! Container::format(path).unwrap();
//!
//! let mut container = Container::open_rw(path).unwrap();
//! container.insert("notes.txt", b"remember the milk").unwrap();
//!
//! let data = container.fetch("notes.txt").unwrap();
//! assert_eq!(data, b"remember the milk");
//! ```

pub mod container;
pub mod error;
pub mod layout;

pub use container::{Container, ContainerStats, DefragReport, Entry, EntryTable, FileInfo, Header};
pub use error::{Error, Result};
