//! Interactive answer to "keep waiting for the network?".

use std::io::{self, BufRead, Write};

use mdl_core::connectivity::{OfflineDecision, OfflinePolicy};

/// Asks once per offline spell on the first failed probe; later probes in
/// the same spell keep waiting.
pub struct RetryPrompt<R> {
    input: R,
}

impl RetryPrompt<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self {
            input: io::BufReader::new(io::stdin()),
        }
    }
}

impl<R: BufRead> RetryPrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> OfflinePolicy for RetryPrompt<R> {
    fn on_offline(&mut self, failed_probes: u32) -> OfflineDecision {
        if failed_probes > 1 {
            return OfflineDecision::KeepWaiting;
        }
        loop {
            eprint!("\nNetwork unreachable. Retry? [Y|N] ");
            let _ = io::stderr().flush();
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return OfflineDecision::GiveUp,
                Ok(_) => {}
            }
            match parse_answer(&line) {
                Some(true) => return OfflineDecision::KeepWaiting,
                Some(false) => return OfflineDecision::GiveUp,
                None => continue,
            }
        }
    }
}

/// Empty answers mean yes.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
