pub mod logger;

use std::process::ExitCode;
use walletsession_cli::cli::Cli;

fn main() -> ExitCode {
    if let Err(err) = logger::setup_logger() {
        eprintln!("Warning: logging disabled: {err}");
    }

    Cli::execute()
}
