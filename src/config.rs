use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::util::{DEFAULT_REQUIREMENTS_ENV, config_dir, default_orbs_path};

/// Requirements files looked up when none is given on the command line.
pub const DEFAULT_REQUIREMENTS: [&str; 2] = ["requirements.txt", "requirements/dev.txt"];
/// The Python executable used when none is configured.
pub const DEFAULT_EXECUTABLE: &str = "python3";

/// Optional settings read from `$XDG_CONFIG_HOME/orbs/config.toml`.
///
/// Command-line flags take precedence over environment variables, which take
/// precedence over this file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The orb storage path.
    pub path: Option<PathBuf>,
    /// The Python executable to use.
    pub executable: Option<String>,
    /// The default requirements paths.
    pub default_requirements: Option<Vec<PathBuf>>,
}

impl Config {
    /// Loads the configuration file, falling back to defaults when it does
    /// not exist.
    pub fn load() -> Result<Config> {
        let config_file = config_dir()?.join("config.toml");
        if !config_file.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_file)
            .with_context(|| format!("Unable to read \"{}\"", config_file.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Unable to parse \"{}\"", config_file.display()))
    }

    /// The effective default requirements paths. An empty
    /// `ORBS_DEFAULT_REQUIREMENTS` value disables default requirements
    /// entirely.
    pub fn default_requirements(&self) -> Vec<PathBuf> {
        let value = std::env::var(DEFAULT_REQUIREMENTS_ENV).ok();
        self.resolve_default_requirements(value.as_deref())
    }

    fn resolve_default_requirements(&self, env: Option<&str>) -> Vec<PathBuf> {
        match env {
            Some("") => Vec::new(),
            Some(value) => value.split(',').map(PathBuf::from).collect(),
            None => self.default_requirements.clone().unwrap_or_else(|| {
                DEFAULT_REQUIREMENTS.iter().map(PathBuf::from).collect()
            }),
        }
    }

    /// The effective Python executable.
    pub fn executable(&self) -> String {
        self.executable.clone().unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string())
    }

    /// The effective orb storage path.
    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => default_orbs_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            "path = \"/tmp/orbs\"\nexecutable = \"python3.12\"\n\
             default_requirements = [\"requirements/prod.txt\"]\n",
        )
        .unwrap();
        assert_eq!(config.path.as_deref(), Some(std::path::Path::new("/tmp/orbs")));
        assert_eq!(config.executable(), "python3.12");
        assert_eq!(config.storage_path().unwrap(), PathBuf::from("/tmp/orbs"));
    }

    #[test]
    fn test_unknown_config_keys_are_rejected() {
        assert!(toml::from_str::<Config>("unknown = true\n").is_err());
    }

    #[test]
    fn test_default_executable() {
        assert_eq!(Config::default().executable(), DEFAULT_EXECUTABLE);
    }

    #[test]
    fn test_default_requirements_fall_back_to_builtins() {
        assert_eq!(
            Config::default().resolve_default_requirements(None),
            DEFAULT_REQUIREMENTS.iter().map(PathBuf::from).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn test_default_requirements_env_override() {
        let config: Config =
            toml::from_str("default_requirements = [\"requirements/prod.txt\"]\n").unwrap();
        assert_eq!(
            config.resolve_default_requirements(Some("a.txt,b.txt")),
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
        );
    }

    #[test]
    fn test_empty_default_requirements_env_disables_defaults() {
        let config: Config =
            toml::from_str("default_requirements = [\"requirements/prod.txt\"]\n").unwrap();
        assert!(config.resolve_default_requirements(Some("")).is_empty());
    }
}
