use std::path::PathBuf;

use anyhow::{Result, anyhow};
use directories::ProjectDirs;

/// Name of the orb that is active in the running shell, set by the
/// activation scripts.
pub const CURRENT_ORB_ENV: &str = "ORBS_CURRENT_ORB";
/// Whether the activation script should start a new shell.
pub const NEW_SHELL_ENV: &str = "ORBS_NEW_SHELL";
/// Whether the activation script should skip changing the directory.
pub const NO_CD_ENV: &str = "ORBS_NO_CD";
/// Comma-separated override of the default requirements paths.
pub const DEFAULT_REQUIREMENTS_ENV: &str = "ORBS_DEFAULT_REQUIREMENTS";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "orbs").ok_or_else(|| anyhow!("Could not get project directories"))
}

/// Returns the default orb storage path (`$XDG_DATA_HOME/orbs`).
pub fn default_orbs_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Returns the configuration directory (`$XDG_CONFIG_HOME/orbs`).
pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Returns the name of the orb that is active in the running shell.
pub fn current_orb() -> Option<String> {
    std::env::var(CURRENT_ORB_ENV).ok().filter(|name| !name.is_empty())
}

/// Expands a leading tilde in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orbs_path() {
        let path = default_orbs_path().unwrap();
        assert!(path.ends_with("orbs"));
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/tmp/orbs"), PathBuf::from("/tmp/orbs"));
        let expanded = expand_path("~/orbs");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("orbs"));
    }
}
