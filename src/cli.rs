use clap::Parser;
use std::path::PathBuf;

/// A tool for managing Python virtual environments.
#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Name of the orb (default: current orb or glowing orb)
    pub name: Option<String>,

    /// Activate an orb (default)
    #[arg(short, long, group = "action")]
    pub activate: bool,

    /// List orbs
    #[arg(short, long, group = "action")]
    pub list: bool,

    /// Make an orb
    #[arg(short, long, group = "action")]
    pub make: bool,

    /// Update an orb
    #[arg(short, long, group = "action")]
    pub update: bool,

    /// Destroy an orb
    #[arg(short, long, group = "action")]
    pub destroy: bool,

    /// Freeze requirements
    #[arg(short, long, group = "action")]
    pub freeze: bool,

    /// Test requirements
    #[arg(short, long, group = "action")]
    pub test: bool,

    /// Show outdated packages of an orb
    #[arg(short, long, group = "action")]
    pub info: bool,

    /// Toggle orb glow
    #[arg(short, long, group = "action")]
    pub glow: bool,

    /// Print the bash completion script
    #[arg(long, group = "action")]
    pub bash: bool,

    /// Requirements path (default: requirements.txt or requirements/dev.txt)
    #[arg(short, long, value_name = "X")]
    pub requirements: Option<PathBuf>,

    /// Command to run after orb activation
    #[arg(short, long, value_name = "X")]
    pub command: Option<String>,

    /// The Python executable to use (default: python3)
    #[arg(short, long, value_name = "X")]
    pub executable: Option<String>,

    /// Orb storage path (default: $XDG_DATA_HOME/orbs)
    #[arg(long, value_name = "X")]
    pub path: Option<String>,

    /// Do not change directory after orb activation
    #[arg(long)]
    pub no_cd: bool,

    /// Activate the orb in a new shell
    #[arg(long)]
    pub shell: bool,

    /// Use the bare requirements file
    #[arg(long)]
    pub bare: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_actions_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["orb", "--list", "--make"]).is_err());
        assert!(Cli::try_parse_from(["orb", "--list"]).is_ok());
    }

    #[test]
    fn test_default_action_with_name() {
        let cli = Cli::try_parse_from(["orb", "sandbox"]).unwrap();
        assert_eq!(cli.name.as_deref(), Some("sandbox"));
        assert!(!cli.activate && !cli.list);
    }
}
