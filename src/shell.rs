use std::fmt;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// The shell flavors that activation scripts are generated for.
pub const SHELL_KINDS: [ShellKind; 2] = [ShellKind::Bash, ShellKind::Fish];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShellKind {
    Bash,
    Fish,
}

impl ShellKind {
    pub fn name(self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Fish => "fish",
        }
    }

    /// Detects the shell flavor from a shell path such as `/usr/bin/fish`.
    pub fn detect(shell: &str) -> Result<ShellKind> {
        for kind in SHELL_KINDS {
            if shell.contains(kind.name()) {
                return Ok(kind);
            }
        }
        bail!("Shell \"{shell}\" is not supported")
    }

    /// Detects the flavor of the user's current shell.
    pub fn current() -> Result<ShellKind> {
        ShellKind::detect(&current_shell()?)
    }

    /// The name of the activation script that `python -m venv` generates
    /// for this shell flavor.
    pub fn venv_activate_script(self) -> &'static str {
        match self {
            ShellKind::Bash => "activate",
            ShellKind::Fish => "activate.fish",
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the user's shell, falling back to the absolute path of `bash`
/// when `$SHELL` is not set.
pub fn current_shell() -> Result<String> {
    match std::env::var("SHELL") {
        Ok(shell) if !shell.is_empty() => Ok(shell),
        _ => which("bash"),
    }
}

/// Returns the absolute path of the given command.
pub fn which(command: &str) -> Result<String> {
    let output = Command::new("which")
        .arg(command)
        .output()
        .context("Unable to run \"which\"")?;
    if !output.status.success() {
        bail!("Command \"{command}\" not found");
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The result of a shell execution.
#[derive(Debug, Default)]
pub struct Execution {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Default)]
pub struct ExecuteOptions<'a> {
    /// An initialization file to source before anything else.
    pub init: Option<&'a Path>,
    /// A one-off command to run instead of an interactive session.
    pub command: Option<&'a str>,
    /// Whether to replace the current process instead of spawning a child.
    pub replace: bool,
    /// Whether to capture the standard output and standard error.
    pub capture: bool,
    /// Extra environment variables for the shell process.
    pub env: Vec<(&'static str, String)>,
}

/// Executes a shell command or starts a new interactive session.
pub fn execute(options: &ExecuteOptions<'_>) -> Result<Execution> {
    if options.replace && options.capture {
        bail!("The output cannot be captured when replacing the current process");
    }

    let shell = current_shell()?;
    let mut args: Vec<String> = Vec::new();
    let command = match (options.init, options.command) {
        (Some(init), Some(command)) => Some(format!("source \"{}\"; {command}", init.display())),
        _ => options.command.map(str::to_string),
    };
    if let (Some(init), None) = (options.init, options.command) {
        match ShellKind::detect(&shell)? {
            ShellKind::Bash => {
                args.push("--init-file".to_string());
                args.push(init.display().to_string());
            }
            ShellKind::Fish => {
                args.push("--init-command".to_string());
                args.push(format!("source \"{}\"", init.display()));
            }
        }
    }
    if let Some(command) = command {
        args.push("-c".to_string());
        args.push(command);
    }

    let mut cmd = Command::new(&shell);
    cmd.args(&args);
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    log::debug!("Executing \"{shell}\" with arguments {args:?}");

    #[cfg(unix)]
    if options.replace {
        use std::os::unix::process::CommandExt;
        // exec only returns on failure
        let error = cmd.exec();
        bail!("Unable to replace the current process with \"{shell}\": {error}");
    }

    if options.capture {
        let output = cmd
            .output()
            .with_context(|| format!("Unable to execute \"{shell}\""))?;
        Ok(Execution {
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    } else {
        let status = cmd
            .status()
            .with_context(|| format!("Unable to execute \"{shell}\""))?;
        Ok(Execution {
            code: status.code().unwrap_or(1),
            ..Execution::default()
        })
    }
}
