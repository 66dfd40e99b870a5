//! Low-level data-region access: alignment math and raw positioned I/O.

use crate::error::Result;
use crate::layout::ALIGNMENT;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Zero bytes needed after a blob of `len` bytes so the next blob
/// starts on an alignment boundary.
pub fn padding_for(len: u64) -> u64 {
    (ALIGNMENT - (len % ALIGNMENT)) % ALIGNMENT
}

/// Round an offset up to the next alignment boundary.
pub fn align_up(offset: u64) -> u64 {
    offset + padding_for(offset)
}

/// Read exactly `len` bytes starting at `offset`.
pub fn read_at(file: &mut File, offset: u64, len: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;

    let mut buffer = vec![0u8; len];
    file.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Write `data` starting at `offset`.
pub fn write_at(file: &mut File, offset: u64, data: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

/// Write a blob at `offset` followed by its trailing zero padding.
/// Returns the padded length actually written.
pub fn write_padded(file: &mut File, offset: u64, data: &[u8]) -> Result<u64> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;

    let padding = padding_for(data.len() as u64);
    if padding > 0 {
        file.write_all(&vec![0u8; padding as usize])?;
    }
    Ok(data.len() as u64 + padding)
}
