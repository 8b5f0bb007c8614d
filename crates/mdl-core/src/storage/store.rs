//! Sidecar lifecycle: length, append-vs-truncate, seek-back on overlap.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::writer::SidecarWriter;
use super::{partial_path, StoreError};
use crate::range::NegotiatedRange;

/// Owns the sidecar for one destination for the duration of a job.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    final_path: PathBuf,
    partial_path: PathBuf,
}

impl ResumeStore {
    pub fn new(final_path: &Path) -> Self {
        Self {
            final_path: final_path.to_path_buf(),
            partial_path: partial_path(final_path),
        }
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    /// Bytes already downloaded: the sidecar's length, or 0 when there is none.
    pub fn current_length(&self) -> Result<u64, StoreError> {
        match fs::metadata(&self.partial_path) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Open the sidecar for the body described by `range`.
    ///
    /// A full-content body truncates. A partial body continues at
    /// `confirmed_offset`; local bytes past that point are stale and are cut
    /// off first, so nothing is duplicated or interleaved. A body starting
    /// past the local length would leave a hole and is refused.
    pub fn open_for(&self, range: &NegotiatedRange) -> Result<SidecarWriter, StoreError> {
        if !range.is_resume() {
            let file = File::options()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.partial_path)
                .map_err(|e| self.io_err(e))?;
            tracing::debug!(path = %self.partial_path.display(), "sidecar truncated for full transfer");
            return Ok(SidecarWriter::new(file, self.partial_path.clone(), 0));
        }

        let confirmed = range.confirmed_offset;
        let local = self.current_length()?;
        if local < confirmed {
            return Err(StoreError::Gap { local, confirmed });
        }

        let mut file = File::options()
            .write(true)
            .open(&self.partial_path)
            .map_err(|e| self.io_err(e))?;
        if local > confirmed {
            tracing::debug!(local, confirmed, "dropping stale sidecar tail before resume");
            file.set_len(confirmed).map_err(|e| self.io_err(e))?;
        }
        file.seek(SeekFrom::Start(confirmed))
            .map_err(|e| self.io_err(e))?;
        Ok(SidecarWriter::new(file, self.partial_path.clone(), confirmed))
    }

    pub(super) fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.partial_path.clone(),
            source,
        }
    }
}
