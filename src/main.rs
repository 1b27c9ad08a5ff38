// Headless front end: every invocation is a one-shot load → effects → save.

use std::process::ExitCode;

use clap::Parser;
use retouch::cli::{self, CliArgs};
use retouch::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.log_file {
        logger::init();
        if args.verbose
            && let Some(path) = logger::log_path()
        {
            eprintln!("log: {}", path.display());
        }
    } else {
        logger::init_stderr(args.verbose);
    }

    cli::run(args)
}
