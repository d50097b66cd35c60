use std::process::ExitCode;

use clap::Parser;
use log::{debug, LevelFilter};
use termux_cad_cli::cli_args::Args;
use termux_cad_cli::commands::{execute, process_exit_code};

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);
    debug!("Arguments: {args:?}");

    match execute(&args) {
        Ok(exit_code) => ExitCode::from(process_exit_code(exit_code)),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
