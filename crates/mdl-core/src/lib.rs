//! Resumable single-stream HTTP download engine.
//!
//! A [`Downloader`] takes a [`TransferRequest`], negotiates a byte range with
//! the server, streams the body into a `.mddownload` sidecar next to the
//! destination and, once the size checks out, reverses any content encoding
//! and renames the result into place. Interrupted jobs resume from the
//! sidecar's length.

pub mod config;
pub mod logging;

pub mod checksum;
pub mod connectivity;
pub mod control;
pub mod decompress;
pub mod destination;
pub mod downloader;
pub mod progress;
pub mod pump;
pub mod range;
pub mod request;
pub mod retry;
pub mod session;
pub mod storage;
pub mod url_model;

pub use config::EngineConfig;
pub use control::CancelToken;
pub use downloader::{Downloader, FailureReason, JobOutcome, JobState};
pub use progress::{TransferObserver, TransferProgress};
pub use request::TransferRequest;
