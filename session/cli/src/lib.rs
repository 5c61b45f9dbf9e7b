//! `walletsession` command line front end
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::unwrap_used)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

/// Chain argument parsing.
pub mod chains;
/// Command-line interface functionality and types.
pub mod cli;
