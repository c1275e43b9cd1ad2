//! `noised` binary entrypoint.

use clap::Parser;
use colored::Colorize;

use noised::cli_app::{self, Cli};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli_app::run(&cli) {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(err.exit_code());
    }
}
