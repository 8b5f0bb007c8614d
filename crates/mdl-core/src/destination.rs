//! Where the final artifact goes.
//!
//! An explicit file path is used as is. A directory (or nothing, meaning the
//! current directory) gets a name derived from the URL, which the first
//! response may still replace with its `attachment` filename.

use std::path::{Path, PathBuf};

use crate::url_model;

#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("destination directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),
    #[error("destination {} has no file name", .0.display())]
    NoFileName(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameSource {
    /// Caller named the file.
    Explicit,
    /// Derived from the URL; a server filename may still replace it.
    Url,
    /// Settled after the first response.
    Pinned,
}

#[derive(Debug, Clone)]
pub struct Destination {
    dir: PathBuf,
    file_name: String,
    source: NameSource,
}

impl Destination {
    pub fn resolve(url: &str, requested: Option<&Path>) -> Result<Self, DestinationError> {
        let from_url = |dir: PathBuf| Self {
            dir,
            file_name: url_model::derive_filename(url, None),
            source: NameSource::Url,
        };

        let Some(path) = requested else {
            return Ok(from_url(PathBuf::from(".")));
        };
        if path.is_dir() {
            return Ok(from_url(path.to_path_buf()));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(url_model::sanitize)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DestinationError::NoFileName(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.is_dir() {
            return Err(DestinationError::MissingDirectory(dir));
        }
        Ok(Self {
            dir,
            file_name,
            source: NameSource::Explicit,
        })
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Apply the first response's `Content-Disposition`. Returns the new final
    /// path when the name changed. Only the first call can change anything.
    pub fn adopt_server_filename(&mut self, content_disposition: Option<&str>) -> Option<PathBuf> {
        if self.source != NameSource::Url {
            return None;
        }
        self.source = NameSource::Pinned;

        let name = content_disposition
            .and_then(url_model::attachment_filename)
            .map(|n| url_model::sanitize(&n))
            .filter(|n| !n.is_empty())?;
        if name == self.file_name {
            return None;
        }
        tracing::debug!(from = %self.file_name, to = %name, "using server-provided filename");
        self.file_name = name;
        Some(self.final_path())
    }
}
