//! Get command: run one download job to completion.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use mdl_core::connectivity::{GiveUpAfter, WaitForever};
use mdl_core::progress::NoProgress;
use mdl_core::{Downloader, EngineConfig, FailureReason, JobOutcome, TransferObserver, TransferRequest};

use crate::cli::progress::ProgressLine;
use crate::cli::prompt::RetryPrompt;
use crate::cli::{EXIT_FAILED, EXIT_OFFLINE, EXIT_OK};

/// Parsed `mdl get` arguments.
#[derive(Debug)]
pub struct GetArgs {
    pub url: String,
    pub output: Option<PathBuf>,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub skip_existing: bool,
    pub timeout: Option<u64>,
    pub sha256: Option<String>,
    pub no_wait: bool,
    pub quiet: bool,
}

impl GetArgs {
    pub fn to_request(&self) -> TransferRequest {
        let mut req = TransferRequest::new(self.url.clone())
            .method(self.method.clone())
            .skip_existing(self.skip_existing);
        if let Some(out) = &self.output {
            req = req.destination(out.clone());
        }
        for (name, value) in &self.headers {
            req = req.header(name.clone(), value.clone());
        }
        for (name, value) in &self.cookies {
            req = req.cookie(name.clone(), value.clone());
        }
        if let Some(secs) = self.timeout {
            req = req.timeout(Duration::from_secs(secs));
        }
        if let Some(digest) = &self.sha256 {
            req = req.expected_sha256(digest.clone());
        }
        req
    }
}

/// Run the job and map its outcome to an exit code.
pub fn run_get(cfg: EngineConfig, args: GetArgs) -> Result<i32> {
    let request = args.to_request();
    let downloader = Downloader::new(cfg);
    let mut downloader = if args.no_wait {
        downloader.offline_policy(GiveUpAfter(1))
    } else if std::io::stdin().is_terminal() {
        downloader.offline_policy(RetryPrompt::stdin())
    } else {
        downloader.offline_policy(WaitForever)
    };

    let mut line = ProgressLine::new();
    let mut silent = NoProgress;
    let observer: &mut dyn TransferObserver = if args.quiet { &mut silent } else { &mut line };
    let outcome = downloader.run(&request, observer);
    line.finish();

    Ok(report(&outcome))
}

fn report(outcome: &JobOutcome) -> i32 {
    match outcome {
        JobOutcome::Done { path, bytes } => {
            println!("saved {} ({} bytes)", path.display(), bytes);
            EXIT_OK
        }
        JobOutcome::Skipped { path } => {
            println!("skipped {}: already exists", path.display());
            EXIT_OK
        }
        JobOutcome::Failed { reason, partial } => {
            eprintln!("mdl: {}", reason);
            if let Some(p) = partial {
                eprintln!("partial data kept in {}; run again to resume", p.display());
            }
            match reason {
                FailureReason::ConnectivityAbandoned => EXIT_OFFLINE,
                _ => EXIT_FAILED,
            }
        }
    }
}
