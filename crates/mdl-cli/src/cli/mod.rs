//! CLI for the MDL downloader.

mod commands;
mod progress;
mod prompt;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mdl_core::config;

use commands::{run_checksum, run_get, GetArgs};

/// Process exit codes.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
/// The operator declined to keep waiting for the network.
pub const EXIT_OFFLINE: i32 = 3;

/// Top-level CLI for the MDL downloader.
#[derive(Debug, Parser)]
#[command(name = "mdl")]
#[command(about = "MDL: resumable single-stream HTTP downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, resuming any earlier partial attempt.
    Get {
        /// HTTP/HTTPS URL to download.
        url: String,

        /// Destination file, or an existing directory to save into.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// HTTP method.
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra request header; overrides the default with the same name.
        #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Cookie sent with every request.
        #[arg(short = 'b', long = "cookie", value_name = "NAME=VALUE", value_parser = parse_cookie)]
        cookies: Vec<(String, String)>,

        /// Do nothing if the destination file already exists.
        #[arg(long)]
        skip_existing: bool,

        /// Base request timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Expected SHA-256 of the downloaded file (hex).
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,

        /// Give up instead of asking when the network is unreachable.
        #[arg(long)]
        no_wait: bool,

        /// Do not draw progress on stderr.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

/// `Name: value` (or `Name=value`) into a header pair.
pub fn parse_header(s: &str) -> Result<(String, String)> {
    let Some((name, value)) = s.split_once(':').or_else(|| s.split_once('=')) else {
        bail!("expected NAME: VALUE, got {:?}", s);
    };
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        bail!("invalid header name in {:?}", s);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// `name=value` into a cookie pair.
pub fn parse_cookie(s: &str) -> Result<(String, String)> {
    let Some((name, value)) = s.split_once('=') else {
        bail!("expected NAME=VALUE, got {:?}", s);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("empty cookie name in {:?}", s);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliCommand {
    /// Parse arguments, run the command, and return the process exit code.
    pub fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                url,
                output,
                method,
                headers,
                cookies,
                skip_existing,
                timeout,
                sha256,
                no_wait,
                quiet,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let args = GetArgs {
                    url,
                    output,
                    method,
                    headers,
                    cookies,
                    skip_existing,
                    timeout,
                    sha256,
                    no_wait,
                    quiet,
                };
                run_get(cfg, args)
            }
            CliCommand::Checksum { path } => {
                run_checksum(&path)?;
                Ok(EXIT_OK)
            }
        }
    }
}

#[cfg(test)]
mod tests;
