//! Partstock - Command-line tool for resolving part requirement lists

use std::process::ExitCode;

use partstock::cli;

fn main() -> ExitCode {
    cli::run()
}
