//! Sequential writer over the sidecar file.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Open handle on the sidecar, positioned where the next body byte belongs.
///
/// Every chunk goes straight to the file (no user-space buffering), so after a
/// crash the sidecar length is exactly the number of bytes already received.
#[derive(Debug)]
pub struct SidecarWriter {
    file: File,
    path: PathBuf,
    position: u64,
}

impl SidecarWriter {
    pub(super) fn new(file: File, path: PathBuf, position: u64) -> Self {
        Self {
            file,
            path,
            position,
        }
    }

    /// Append `data` at the current position.
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// Absolute offset of the next byte to be written.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Sync file data to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
