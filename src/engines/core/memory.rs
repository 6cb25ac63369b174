//! Memory-mapped file access
//!
//! Large genome files are parsed straight out of a read-only mapping instead
//! of being copied through a read buffer first.

use std::fs::File;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

/// Read-only memory-mapped file
pub struct MemoryMapped {
    /// `None` for zero-length files, which cannot be mapped
    mmap: Option<Mmap>,
    len: usize,
}

impl MemoryMapped {
    /// Map the file at `path` read-only
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len() as usize;

        if len == 0 {
            return Ok(Self { mmap: None, len });
        }

        // Safety: the mapping is read-only and lives no longer than `self`;
        // callers must not truncate the file while it is mapped.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(Self { mmap: Some(mmap), len })
    }

    /// Get a reference to the underlying memory-mapped data
    pub fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..self.len],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
