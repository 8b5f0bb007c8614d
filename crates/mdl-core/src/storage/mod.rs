//! Disk I/O and sidecar lifecycle.
//!
//! Bytes land in `<final>.mddownload` as they arrive; the sidecar's length is
//! the only record of progress. Finalization verifies the size, reverses any
//! content encoding, and renames the result onto the final name.

mod finalize;
mod store;
mod writer;

use std::io;
use std::path::{Path, PathBuf};

use crate::decompress::DecompressError;

pub use finalize::FinalizeSpec;
pub use store::ResumeStore;
pub use writer::SidecarWriter;

/// Sidecar suffix appended to the final path while a download is incomplete.
pub const PARTIAL_SUFFIX: &str = ".mddownload";

/// Path for the sidecar: appends the suffix to the final path
/// (e.g. `file.iso` → `file.iso.mddownload`).
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(PARTIAL_SUFFIX);
    PathBuf::from(o)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sidecar I/O on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("server resumes at byte {confirmed} but only {local} bytes are held locally")]
    Gap { local: u64, confirmed: u64 },
    #[error("size mismatch: expected {expected} bytes, sidecar holds {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("transfer of unknown size produced no bytes")]
    Empty,
    #[error(transparent)]
    Decode(#[from] DecompressError),
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("failed to rename {} to {} (is another process using it?): {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
