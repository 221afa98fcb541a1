use std::process::ExitCode;

use anyhow::Result;

use crate::cli::Cli;
use orbs::config::Config;
use orbs::orbs::{ActivateOptions, MakeOptions, Orbs};
use orbs::templates::ORB_COMPLETION_BASH;
use orbs::util::expand_path;

pub fn execute(cli: Cli) -> Result<ExitCode> {
    let config = Config::load()?;
    let storage = match &cli.path {
        Some(path) => expand_path(path),
        None => config.storage_path()?,
    };
    let executable = cli.executable.clone().unwrap_or_else(|| config.executable());
    let orbs = Orbs::new(storage, config.default_requirements());

    if cli.list {
        orbs.list();
    } else if cli.make {
        orbs.make(&MakeOptions {
            name: cli.name.as_deref(),
            requirements: cli.requirements.clone(),
            executable: &executable,
            bare: cli.bare,
            ..MakeOptions::default()
        })?;
    } else if cli.update {
        orbs.update(cli.name.as_deref(), &MakeOptions {
            requirements: cli.requirements.clone(),
            executable: &executable,
            bare: cli.bare,
            ..MakeOptions::default()
        })?;
    } else if cli.destroy {
        orbs.destroy(cli.name.as_deref())?;
    } else if cli.freeze {
        orbs.freeze(cli.requirements.as_deref(), &executable)?;
    } else if cli.test {
        if orbs.test(cli.requirements.as_deref(), false)? {
            return Ok(ExitCode::from(1));
        }
    } else if cli.info {
        orbs.info(cli.name.as_deref())?;
    } else if cli.glow {
        orbs.glow(cli.name.as_deref())?;
    } else if cli.bash {
        print!("{ORB_COMPLETION_BASH}");
    } else {
        let execution = orbs.activate(cli.name.as_deref(), &ActivateOptions {
            command: cli.command.as_deref(),
            new_shell: cli.shell,
            no_cd: cli.no_cd,
            ..ActivateOptions::default()
        })?;
        return Ok(exit_code(execution.code));
    }
    Ok(ExitCode::SUCCESS)
}

/// Maps a child process exit code to our own.
fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
