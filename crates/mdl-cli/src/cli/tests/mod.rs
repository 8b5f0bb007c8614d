//! CLI parse and helper tests.

use clap::Parser;

use super::{Cli, CliCommand};

mod helpers;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    Cli::try_parse_from(args).expect("parse").command
}
