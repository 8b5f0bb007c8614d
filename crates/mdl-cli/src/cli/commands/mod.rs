//! CLI command handlers.

mod checksum;
mod get;

pub use checksum::run_checksum;
pub use get::{run_get, GetArgs};
