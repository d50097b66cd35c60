//! termux-cad CLI Library
//!
//! This crate provides the `tcad` command-line front-end of termux-cad. It
//! parses arguments, builds a supervisor from the environment and runs one
//! of the subcommands:
//!
//! - `run`: one shell operation with a progress indicator and a deadline
//! - `install`: a package, skipped when already present
//! - `download`: a file over HTTP with retries
//! - `plan`: a YAML install plan, with confirmation, dry run and resume
//!
//! # Examples
//!
//! ```bash
//! # One operation, killed after 3 x 60 seconds
//! tcad run -m "Updating packages" -e 60 -- pkg update -y
//!
//! # Show the step position like a longer install script would
//! tcad --total-steps 15 --step 4 install xfce4
//!
//! # Download with a readable name
//! tcad download https://example.org/viewer.apk ~/storage/downloads/viewer.apk -d "CAD viewer"
//!
//! # Run the default plan, resuming after an interrupted run
//! tcad plan --resume -p apk_dir=/sdcard/Download
//! ```

pub mod arguments;
pub mod cli_args;
pub mod commands;
pub mod confirmation;
