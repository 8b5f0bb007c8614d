//! Finalization: size check, encoding reversal, optional checksum, rename.

use std::fs::{self, File};
use std::io::{self, BufReader};

use super::store::ResumeStore;
use super::StoreError;
use crate::checksum;
use crate::decompress::EncodingChain;

/// What finalization needs besides the sidecar itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalizeSpec<'a> {
    /// Total size negotiated with the server, if known.
    pub expected_size: Option<u64>,
    /// Raw `Content-Encoding` of the transferred body.
    pub content_encoding: Option<&'a str>,
    /// Expected SHA-256 (hex) of the final, decoded artifact.
    pub expected_sha256: Option<&'a str>,
}

impl ResumeStore {
    /// Turn a complete sidecar into the final artifact and return its size.
    ///
    /// On any error the sidecar is left exactly as it was, so a later run can
    /// resume it or a human can inspect it. The destination is only ever
    /// replaced by a rename, never written in place.
    pub fn finalize(&self, spec: FinalizeSpec<'_>) -> Result<u64, StoreError> {
        let actual = self.current_length()?;
        match spec.expected_size {
            Some(expected) if expected != actual => {
                return Err(StoreError::SizeMismatch { expected, actual });
            }
            None if actual == 0 => return Err(StoreError::Empty),
            _ => {}
        }

        // Parse before touching anything: an unknown coding keeps the raw sidecar.
        let chain = EncodingChain::parse(spec.content_encoding)?;

        if chain.is_identity() {
            if let Some(expected) = spec.expected_sha256 {
                let digest = checksum::sha256_path(self.partial_path()).map_err(|e| self.io_err(e))?;
                verify(&digest, expected)?;
            }
            self.rename_into_place()?;
        } else {
            self.decode_into_place(&chain, spec.expected_sha256)?;
        }

        let final_len = fs::metadata(self.final_path())
            .map(|m| m.len())
            .unwrap_or(actual);
        tracing::info!(
            path = %self.final_path().display(),
            bytes = final_len,
            "download finalized"
        );
        Ok(final_len)
    }

    fn rename_into_place(&self) -> Result<(), StoreError> {
        fs::rename(self.partial_path(), self.final_path()).map_err(|source| StoreError::Rename {
            from: self.partial_path().to_path_buf(),
            to: self.final_path().to_path_buf(),
            source,
        })
    }

    /// Decode into a temp sibling of the destination, then swap it in.
    fn decode_into_place(
        &self,
        chain: &EncodingChain,
        expected_sha256: Option<&str>,
    ) -> Result<(), StoreError> {
        let dir = match self.final_path().parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_err(e))?;

        let src = File::open(self.partial_path()).map_err(|e| self.io_err(e))?;
        let mut reader = chain.decoding_reader(BufReader::new(src));
        io::copy(&mut reader, tmp.as_file_mut())
            .map_err(|e| StoreError::Decode(e.into()))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;

        if let Some(expected) = expected_sha256 {
            let digest = checksum::sha256_path(tmp.path()).map_err(|e| self.io_err(e))?;
            verify(&digest, expected)?;
        }

        tmp.persist(self.final_path()).map_err(|e| StoreError::Rename {
            from: e.file.path().to_path_buf(),
            to: self.final_path().to_path_buf(),
            source: e.error,
        })?;
        if let Err(e) = fs::remove_file(self.partial_path()) {
            tracing::warn!(
                path = %self.partial_path().display(),
                "decoded artifact in place but sidecar removal failed: {}",
                e
            );
        }
        Ok(())
    }
}

fn verify(actual: &str, expected: &str) -> Result<(), StoreError> {
    if checksum::digest_matches(actual, expected) {
        Ok(())
    } else {
        Err(StoreError::ChecksumMismatch {
            expected: expected.trim().to_ascii_lowercase(),
            actual: actual.to_string(),
        })
    }
}
