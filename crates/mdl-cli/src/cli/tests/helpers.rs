use std::io::Cursor;
use std::time::Duration;

use mdl_core::connectivity::{OfflineDecision, OfflinePolicy};
use mdl_core::TransferProgress;

use crate::cli::progress::{format_eta, format_progress};
use crate::cli::prompt::{parse_answer, RetryPrompt};
use crate::cli::{parse_cookie, parse_header};

#[test]
fn header_parser_accepts_colon_or_equals() {
    assert_eq!(parse_header("X-A: 1").unwrap(), ("X-A".into(), "1".into()));
    assert_eq!(parse_header("X-A=1").unwrap(), ("X-A".into(), "1".into()));
    assert_eq!(
        parse_header("Authorization: Bearer a:b").unwrap(),
        ("Authorization".into(), "Bearer a:b".into())
    );
    assert!(parse_header(": 1").is_err());
    assert!(parse_header("Bad Name: 1").is_err());
}

#[test]
fn cookie_parser_splits_on_first_equals() {
    assert_eq!(parse_cookie("a=b=c").unwrap(), ("a".into(), "b=c".into()));
    assert_eq!(parse_cookie("empty=").unwrap(), ("empty".into(), String::new()));
    assert!(parse_cookie("=x").is_err());
}

#[test]
fn prompt_answers() {
    assert_eq!(parse_answer("\n"), Some(true));
    assert_eq!(parse_answer("Y\n"), Some(true));
    assert_eq!(parse_answer(" no "), Some(false));
    assert_eq!(parse_answer("maybe"), None);
}

#[test]
fn prompt_reasks_until_understood_and_only_once_per_spell() {
    let mut p = RetryPrompt::new(Cursor::new("what\nn\n"));
    assert_eq!(p.on_offline(1), OfflineDecision::GiveUp);

    let mut p = RetryPrompt::new(Cursor::new("y\n"));
    assert_eq!(p.on_offline(1), OfflineDecision::KeepWaiting);
    // No input left, but later probes in the same spell do not ask.
    assert_eq!(p.on_offline(2), OfflineDecision::KeepWaiting);
    // Closed input on a new spell gives up.
    assert_eq!(p.on_offline(1), OfflineDecision::GiveUp);
}

#[test]
fn progress_text() {
    let p = TransferProgress {
        bytes_done: 512 * 1024,
        total_bytes: Some(1024 * 1024),
        bytes_per_sec: 256.0 * 1024.0,
    };
    assert_eq!(format_progress(&p), "0.5/1.0 MiB  50.0% 0.25 MiB/s ETA 00:02");

    let unknown = TransferProgress {
        bytes_done: 3 * 1024 * 1024,
        total_bytes: None,
        bytes_per_sec: 0.0,
    };
    assert_eq!(format_progress(&unknown), "3.0 MiB 0.00 MiB/s");
}

#[test]
fn eta_text() {
    assert_eq!(format_eta(None), "--:--");
    assert_eq!(format_eta(Some(Duration::from_secs(75))), "01:15");
    assert_eq!(format_eta(Some(Duration::from_secs(3723))), "1:02:03");
}
