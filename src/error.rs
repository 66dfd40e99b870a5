//! Error types for container image operations.

use thiserror::Error;

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while working with a container image.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during image or host-file access.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a container image.
    #[error("Invalid image format: bad magic tag")]
    InvalidMagic,

    /// The image uses a format version this build does not understand.
    #[error("Unsupported format version: expected {expected}, found {found}")]
    UnsupportedVersion { expected: u8, found: u8 },

    /// A header or entry field contradicts the fixed layout.
    #[error("Corrupt image layout: {0}")]
    InvalidLayout(String),

    /// The image is shorter than the region being read.
    #[error("Image truncated: {actual} bytes on disk, need at least {expected}")]
    TruncatedImage { expected: u64, actual: u64 },

    /// No stored file matches the requested name.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A stored file already uses this name.
    #[error("File already exists: {0}")]
    NameExists(String),

    /// The name does not fit the fixed 32-byte name field.
    #[error("File name exceeds {max} bytes: {name}")]
    NameTooLong { name: String, max: usize },

    /// The name cannot be stored at all.
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// The entry table reports itself full.
    #[error("Entry table is full")]
    TableFull,

    /// No structurally empty slot is left for a new entry. Slots held
    /// by soft-deleted files are only released by defragmentation.
    #[error("No empty entry slot available")]
    NoFreeSlot,

    /// Growing the image would pass the 4 GiB addressing ceiling.
    #[error("Size limit exceeded: image would grow to {needed} bytes, limit is {limit}")]
    SizeLimitExceeded { needed: u64, limit: u64 },
}
