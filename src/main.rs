mod cli;
mod execute;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use crate::cli::Cli;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match execute::execute(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error:#}", "Error:".red());
            ExitCode::FAILURE
        }
    }
}
