use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::templates::{LOCKFILE_HEADER, render};

/// Derived state of a requirements manifest chain.
#[derive(Debug)]
struct Processed {
    /// SHA-256 over the manifest and all transitively referenced files.
    current_hash: String,
    /// Pass-through installer options found in the chain (anything but `-r`/`-c`).
    options: Vec<String>,
    /// Whether the lockfile exists and records a different hash.
    outdated: bool,
}

#[derive(Debug, Default)]
pub struct RequirementsOptions<'a> {
    /// The path to the requirements file.
    pub path: Option<PathBuf>,
    /// Fallback paths used when no explicit path is given.
    pub default_paths: &'a [PathBuf],
    /// Whether to use the bare requirements file, skipping staleness tracking.
    pub bare: bool,
    /// Whether a requirements file must be found.
    pub required: bool,
    /// Whether an outdated lockfile is acceptable.
    pub allow_outdated: bool,
}

/// A requirements manifest together with its lockfile state.
///
/// The manifest chain consists of the manifest itself plus every file it
/// transitively references through `-r` or `-c` lines. The chain hash is
/// compared against the hash recorded in the sibling `<name>.lock` file to
/// decide whether the lockfile is stale.
#[derive(Debug)]
pub struct Requirements {
    pub path: Option<PathBuf>,
    pub lockfile: Option<PathBuf>,
    pub outdated: bool,
    pub changed: bool,
    processed: Option<Processed>,
    effective: Option<PathBuf>,
}

impl Requirements {
    pub fn resolve(options: RequirementsOptions<'_>) -> Result<Requirements> {
        let path = options
            .path
            .or_else(|| options.default_paths.iter().find(|path| path.exists()).cloned());
        let Some(path) = path else {
            if options.required {
                bail!("The requirements file must be specified");
            }
            return Ok(Requirements::empty());
        };
        if !path.exists() {
            bail!("Requirements file \"{}\" not found", path.display());
        }
        if !path.is_file() {
            bail!("Invalid requirements file \"{}\"", path.display());
        }
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Invalid requirements file name \"{}\"", path.display()))?;
        let lockfile = path.with_file_name(format!("{file_name}.lock"));

        let mut requirements = Requirements {
            path: Some(path.clone()),
            lockfile: Some(lockfile.clone()),
            outdated: false,
            changed: false,
            processed: None,
            effective: None,
        };
        if !options.bare {
            let processed = process(&path, &lockfile)?;
            requirements.outdated = processed.outdated;
            requirements.changed = !lockfile.exists() || processed.outdated;
            requirements.processed = Some(processed);
        }
        if requirements.outdated && !options.allow_outdated {
            bail!("{}", requirements.status());
        }
        requirements.effective = Some(if options.bare || requirements.changed {
            path
        } else {
            lockfile
        });
        Ok(requirements)
    }

    fn empty() -> Requirements {
        Requirements {
            path: None,
            lockfile: None,
            outdated: false,
            changed: false,
            processed: None,
            effective: None,
        }
    }

    /// Whether no requirements file was found.
    pub fn is_empty(&self) -> bool {
        self.effective.is_none()
    }

    /// The file that should be handed to the installer: the manifest itself
    /// when bare or changed, the lockfile otherwise.
    pub fn effective_path(&self) -> Option<&Path> {
        self.effective.as_deref()
    }

    /// A one-line description of the lockfile state.
    pub fn status(&self) -> String {
        match (&self.path, &self.lockfile) {
            (Some(path), Some(lockfile)) if lockfile.exists() => format!(
                "Requirements lockfile of \"{}\" is {}",
                path.display(),
                if self.outdated { "outdated" } else { "up-to-date" },
            ),
            (Some(path), _) => {
                format!("Requirements file \"{}\" does not have a lockfile", path.display())
            }
            _ => "There are no requirements".to_string(),
        }
    }

    /// Regenerates the lockfile from the given frozen package list.
    pub fn update_lockfile(&self, frozen: &str) -> Result<()> {
        let (Some(lockfile), Some(processed)) = (&self.lockfile, &self.processed) else {
            bail!("Cannot update the lockfile of an empty or bare orb");
        };
        let header = render(LOCKFILE_HEADER, &[("hash", &processed.current_hash)]);
        let mut lines = processed.options.clone();
        lines.push(frozen.to_string());
        fs::write(lockfile, header + &lines.join("\n"))
            .with_context(|| format!("Unable to write lockfile \"{}\"", lockfile.display()))?;
        println!("Frozen requirements are written to \"{}\"", lockfile.display());
        Ok(())
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.effective {
            Some(path) => write!(f, "{}", path.display()),
            None => Ok(()),
        }
    }
}

/// Walks the manifest chain breadth-first in first-seen order, hashing every
/// file and collecting pass-through options along the way.
fn process(path: &Path, lockfile: &Path) -> Result<Processed> {
    let stored_hash = if lockfile.exists() {
        Some(stored_hash(lockfile)?)
    } else {
        None
    };

    let reference_re = Regex::new(r"(?m)^-[rc] (.+)$")?;
    let option_re = Regex::new(r"(?m)^(-[^rc].*)$")?;

    let mut hasher = Sha256::new();
    let mut options = Vec::new();
    let mut queue = VecDeque::from([path.to_path_buf()]);
    let mut seen: HashSet<PathBuf> = HashSet::from([path.to_path_buf()]);
    while let Some(entry) = queue.pop_front() {
        if !entry.exists() {
            bail!(
                "Requirements file \"{}\" not found (referenced by \"{}\")",
                entry.display(),
                path.display(),
            );
        }
        let text = fs::read_to_string(&entry)
            .with_context(|| format!("Unable to read requirements file \"{}\"", entry.display()))?;
        hasher.update(text.as_bytes());
        for capture in option_re.captures_iter(&text) {
            options.push(capture[1].to_string());
        }
        for capture in reference_re.captures_iter(&text) {
            let referenced = entry.parent().unwrap_or(Path::new("")).join(&capture[1]);
            if seen.insert(referenced.clone()) {
                queue.push_back(referenced);
            }
        }
    }

    let current_hash = hex::encode(hasher.finalize());
    log::debug!("Requirements hash of \"{}\" is {current_hash}", path.display());
    Ok(Processed {
        outdated: stored_hash.is_some_and(|stored| stored != current_hash),
        current_hash,
        options,
    })
}

/// Reads the requirements hash recorded in a lockfile.
fn stored_hash(lockfile: &Path) -> Result<String> {
    let text = fs::read_to_string(lockfile)
        .with_context(|| format!("Unable to read lockfile \"{}\"", lockfile.display()))?;
    let hash_re = Regex::new(r"#\s*Requirements hash: (.+)")?;
    match hash_re.captures(&text) {
        Some(capture) => Ok(capture[1].to_string()),
        None => bail!("Invalid lockfile \"{}\"", lockfile.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn resolve(path: &Path, allow_outdated: bool) -> Result<Requirements> {
        Requirements::resolve(RequirementsOptions {
            path: Some(path.to_path_buf()),
            allow_outdated,
            ..RequirementsOptions::default()
        })
    }

    #[test]
    fn test_empty_requirements() {
        let requirements = Requirements::resolve(RequirementsOptions::default()).unwrap();
        assert!(requirements.is_empty());
        assert!(!requirements.outdated);
        assert!(!requirements.changed);
        assert!(requirements.effective_path().is_none());
    }

    #[test]
    fn test_required_requirements_missing() {
        let error = Requirements::resolve(RequirementsOptions {
            required: true,
            ..RequirementsOptions::default()
        })
        .unwrap_err();
        assert!(error.to_string().contains("must be specified"));
    }

    #[test]
    fn test_default_paths() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "requests\n");
        let defaults = [dir.path().join("missing.txt"), path.clone()];
        let requirements = Requirements::resolve(RequirementsOptions {
            default_paths: &defaults,
            ..RequirementsOptions::default()
        })
        .unwrap();
        assert_eq!(requirements.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_requirements_without_lockfile() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "requests\n");
        let requirements = resolve(&path, false).unwrap();
        assert!(!requirements.outdated);
        assert!(requirements.changed);
        assert_eq!(requirements.effective_path(), Some(path.as_path()));
        assert!(requirements.status().contains("does not have a lockfile"));
    }

    #[test]
    fn test_requirements_with_current_lockfile() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "requests\n");
        resolve(&path, false).unwrap().update_lockfile("requests==2.32.0").unwrap();

        let requirements = resolve(&path, false).unwrap();
        assert!(!requirements.outdated);
        assert!(!requirements.changed);
        assert_eq!(requirements.effective_path(), Some(requirements.lockfile.as_deref().unwrap()));
        assert!(requirements.status().contains("up-to-date"));
    }

    #[test]
    fn test_requirements_with_outdated_lockfile() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "requests\n");
        resolve(&path, false).unwrap().update_lockfile("requests==2.32.0").unwrap();
        write(dir.path(), "requirements.txt", "requests\nflask\n");

        let requirements = resolve(&path, true).unwrap();
        assert!(requirements.outdated);
        assert!(requirements.changed);
        assert!(requirements.status().contains("outdated"));

        let error = resolve(&path, false).unwrap_err();
        assert!(error.to_string().contains("outdated"));
    }

    #[test]
    fn test_bare_requirements_skip_tracking() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "requests\n");
        resolve(&path, false).unwrap().update_lockfile("requests==2.32.0").unwrap();
        write(dir.path(), "requirements.txt", "requests\nflask\n");

        let requirements = Requirements::resolve(RequirementsOptions {
            path: Some(path.clone()),
            bare: true,
            ..RequirementsOptions::default()
        })
        .unwrap();
        assert!(!requirements.outdated);
        assert!(!requirements.changed);
        assert_eq!(requirements.effective_path(), Some(path.as_path()));
    }

    #[test]
    fn test_chain_hash_includes_references() {
        let dir = tempdir().unwrap();
        write(dir.path(), "base.txt", "flask\n");
        let path = write(dir.path(), "requirements.txt", "-r base.txt\nrequests\n");
        resolve(&path, false).unwrap().update_lockfile("requests==2.32.0").unwrap();

        assert!(!resolve(&path, false).unwrap().outdated);
        write(dir.path(), "base.txt", "flask==3.0\n");
        assert!(resolve(&path, true).unwrap().outdated);
    }

    #[test]
    fn test_chain_reference_cycle_is_visited_once() {
        let dir = tempdir().unwrap();
        write(dir.path(), "base.txt", "-r requirements.txt\nflask\n");
        let path = write(dir.path(), "requirements.txt", "-r base.txt\nrequests\n");
        let requirements = resolve(&path, false).unwrap();
        assert!(requirements.changed);
    }

    #[test]
    fn test_missing_reference() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "-r missing.txt\n");
        let error = resolve(&path, false).unwrap_err();
        assert!(error.to_string().contains("not found (referenced by"));
    }

    #[test]
    fn test_options_are_carried_into_the_lockfile() {
        let dir = tempdir().unwrap();
        write(dir.path(), "constraints.txt", "urllib3<3\n");
        let path = write(
            dir.path(),
            "requirements.txt",
            "--index-url https://example.com/simple\n-c constraints.txt\nrequests\n",
        );
        let requirements = resolve(&path, false).unwrap();
        requirements.update_lockfile("requests==2.32.0\nurllib3==2.2.0").unwrap();

        let lockfile = fs::read_to_string(requirements.lockfile.unwrap()).unwrap();
        assert!(lockfile.contains("--index-url https://example.com/simple"));
        assert!(!lockfile.contains("-c constraints.txt"));
        assert!(lockfile.contains("requests==2.32.0"));
        assert!(lockfile.contains("Requirements hash: "));
    }

    #[test]
    fn test_invalid_lockfile() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "requirements.txt", "requests\n");
        write(dir.path(), "requirements.txt.lock", "no hash line here\n");
        let error = resolve(&path, false).unwrap_err();
        assert!(error.to_string().contains("Invalid lockfile"));
    }

    #[test]
    fn test_update_lockfile_of_empty_requirements() {
        let requirements = Requirements::resolve(RequirementsOptions::default()).unwrap();
        let error = requirements.update_lockfile("test").unwrap_err();
        assert!(error.to_string().contains("Cannot update the lockfile"));
    }

    #[test]
    fn test_nonexistent_requirements_file() {
        let dir = tempdir().unwrap();
        let error = resolve(&dir.path().join("missing.txt"), false).unwrap_err();
        assert!(error.to_string().contains("not found"));
    }
}
