use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use walkdir::WalkDir;

use crate::reqs::{Requirements, RequirementsOptions};
use crate::shell::{ExecuteOptions, Execution, SHELL_KINDS, ShellKind, execute, which};
use crate::templates::{activation_template, render};
use crate::util::{NEW_SHELL_ENV, NO_CD_ENV, current_orb};

#[derive(Debug, Default)]
pub struct ActivateOptions<'a> {
    /// A command to run in the activated orb instead of a session.
    pub command: Option<&'a str>,
    /// Whether to activate the orb in a new shell.
    pub new_shell: bool,
    /// Whether to skip changing the working directory after activation.
    pub no_cd: bool,
    /// Whether to capture the standard output and standard error.
    pub capture: bool,
}

#[derive(Debug, Default)]
pub struct MakeOptions<'a> {
    /// The name of the orb; mandatory for a fresh make.
    pub name: Option<&'a str>,
    /// The path to the requirements file.
    pub requirements: Option<PathBuf>,
    /// The Python executable to use.
    pub executable: &'a str,
    /// Whether to use the bare requirements file.
    pub bare: bool,
    /// Whether an existing orb is being updated.
    pub update: bool,
    /// Whether to suppress progress output.
    pub quiet: bool,
    /// An alternative storage directory (used for throwaway freeze orbs).
    pub storage: Option<&'a Path>,
}

/// Manager of the orb storage directory.
///
/// Each orb is a virtual environment living in its own subdirectory; the
/// `glowing` file next to them records the name of the default orb.
#[derive(Debug)]
pub struct Orbs {
    path: PathBuf,
    default_requirements: Vec<PathBuf>,
}

impl Orbs {
    pub fn new(path: PathBuf, default_requirements: Vec<PathBuf>) -> Orbs {
        Orbs { path, default_requirements }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The names of all orbs in the storage directory.
    pub fn names(&self) -> BTreeSet<String> {
        if !self.path.exists() {
            return BTreeSet::new();
        }
        WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect()
    }

    fn glowing_file(&self) -> PathBuf {
        self.path.join("glowing")
    }

    /// The name of the glowing (default) orb, if any.
    pub fn glowing(&self) -> Option<String> {
        fs::read_to_string(self.glowing_file())
            .ok()
            .map(|name| name.trim_end().to_string())
            .filter(|name| !name.is_empty())
    }

    /// Resolves an orb name from the explicit argument, the orb that is
    /// active in the running shell, or the glowing orb.
    fn resolve_name(
        &self,
        explicit: Option<&str>,
        use_current: bool,
        use_glowing: bool,
        check: bool,
    ) -> Result<String> {
        let name = explicit
            .map(str::to_string)
            .or_else(|| if use_current { current_orb() } else { None })
            .or_else(|| if use_glowing { self.glowing() } else { None });
        let Some(name) = name else {
            bail!("The orb name must be specified");
        };
        if check && !self.names().contains(&name) {
            bail!("Unknown orb name \"{name}\"");
        }
        Ok(name)
    }

    /// Lists the orbs, marking the glowing one.
    pub fn list(&self) {
        let glowing = self.glowing();
        let names: Vec<String> = self
            .names()
            .into_iter()
            .map(|name| {
                if Some(&name) == glowing.as_ref() {
                    format!("{name} *")
                } else {
                    name
                }
            })
            .collect();
        if names.is_empty() {
            println!("There are no orbs");
        } else {
            println!("{}", names.join("\n"));
        }
    }

    /// Designates the glowing orb.
    pub fn glow(&self, name: Option<&str>) -> Result<()> {
        let name = self.resolve_name(name, true, false, true)?;
        self.set_glowing(&name)
    }

    fn set_glowing(&self, name: &str) -> Result<()> {
        fs::create_dir_all(&self.path)
            .with_context(|| format!("Unable to create \"{}\"", self.path.display()))?;
        fs::write(self.glowing_file(), name)
            .with_context(|| format!("Unable to write \"{}\"", self.glowing_file().display()))?;
        println!("Orb \"{}\" is glowing now", name.bold());
        Ok(())
    }

    /// Activates an orb: sources its activation script in the current shell
    /// flavor, then either replaces the process with a session or runs a
    /// one-off command.
    pub fn activate(&self, name: Option<&str>, options: &ActivateOptions<'_>) -> Result<Execution> {
        let name = self.resolve_name(name, true, true, true)?;
        self.activate_orb(&self.path, &name, options)
    }

    fn activate_orb(
        &self,
        storage: &Path,
        name: &str,
        options: &ActivateOptions<'_>,
    ) -> Result<Execution> {
        let kind = ShellKind::current()?;
        let init = storage.join(name).join("bin").join(format!("activate_orb.{kind}"));
        if !init.exists() {
            bail!("Orb activation file \"{}\" not found", init.display());
        }
        if !options.capture {
            println!("Activating orb \"{}\"...", name.bold());
        }
        if options.command.is_none() {
            self.set_glowing(name)?;
        }
        if let Some(command) = options.command {
            if !options.capture {
                println!("Running \"{command}\"...");
            }
        }
        let new_shell = options.new_shell && options.command.is_none();
        execute(&ExecuteOptions {
            init: Some(&init),
            command: options.command,
            replace: !options.capture,
            capture: options.capture,
            env: vec![
                (NEW_SHELL_ENV, u8::from(new_shell).to_string()),
                (NO_CD_ENV, u8::from(options.no_cd).to_string()),
            ],
        })
    }

    /// Makes or updates an orb: creates the virtual environment, writes the
    /// activation scripts, installs the requirements and regenerates the
    /// lockfile when the requirements changed.
    pub fn make(&self, options: &MakeOptions<'_>) -> Result<()> {
        let storage = options.storage.unwrap_or(&self.path);
        let name = match options.name {
            Some(name) => name.to_string(),
            None => {
                self.resolve_name(None, options.update, options.update, options.update)?
            }
        };
        let requirements = Requirements::resolve(RequirementsOptions {
            path: options.requirements.clone(),
            default_paths: &self.default_requirements,
            bare: options.bare,
            required: options.update,
            allow_outdated: options.update,
        })?;

        let executable = which(options.executable)?;
        if !options.quiet {
            if requirements.is_empty() {
                println!("Making empty orb \"{}\"", name.bold());
            } else {
                println!(
                    "{} orb \"{}\" using \"{requirements}\"...",
                    if options.update { "Updating" } else { "Making" },
                    name.bold(),
                );
            }
            println!("Python executable: {executable}");
        }

        // Creating the virtual environment
        fs::create_dir_all(storage)
            .with_context(|| format!("Unable to create \"{}\"", storage.display()))?;
        let orb_dir = storage.join(&name);
        let venv = format!("{executable} -m venv --clear \"{}\"", orb_dir.display());
        log::debug!("Creating virtual environment with: {venv}");
        if execute(&ExecuteOptions { command: Some(&venv), ..ExecuteOptions::default() })?.code != 0
        {
            bail!("Unable to create virtual environment");
        }

        // Creating the activation scripts
        let bin_dir = orb_dir.join("bin");
        let cwd = std::env::current_dir()?;
        for kind in SHELL_KINDS {
            let script = bin_dir.join(format!("activate_orb.{kind}"));
            let activate_script = bin_dir.join(kind.venv_activate_script());
            let content = render(activation_template(kind), &[
                ("name", &name),
                ("cwd", &cwd.display().to_string()),
                ("activate_script", &activate_script.display().to_string()),
            ]);
            fs::write(&script, content)
                .with_context(|| format!("Unable to write \"{}\"", script.display()))?;
        }

        // Installing the requirements
        if !requirements.is_empty() {
            let init = bin_dir.join(format!("activate_orb.{}", ShellKind::current()?));
            let install = format!(
                "source \"{}\" && pip install --upgrade pip setuptools wheel \
                 && pip install --upgrade --requirement \"{requirements}\"",
                init.display(),
            );
            let execution =
                execute(&ExecuteOptions { command: Some(&install), ..ExecuteOptions::default() })?;
            if execution.code != 0 {
                bail!("Unable to install requirements");
            }

            // Regenerating the lockfile
            if requirements.changed {
                // Filtering pkg-resources, see
                // https://bugs.launchpad.net/ubuntu/+source/python-pip/+bug/1635463
                let freeze = "pip freeze --all --exclude-editable | grep -v \"pkg[-_]resources\"";
                let process = self.activate_orb(storage, &name, &ActivateOptions {
                    command: Some(freeze),
                    capture: true,
                    ..ActivateOptions::default()
                })?;
                requirements.update_lockfile(&process.stdout)?;
            }
        }

        if !options.quiet {
            println!("Orb \"{}\" is ready for use", name.bold());
        }
        Ok(())
    }

    /// Updates an existing orb from its requirements.
    pub fn update(&self, name: Option<&str>, options: &MakeOptions<'_>) -> Result<()> {
        let name = self.resolve_name(name, true, true, true)?;
        self.make(&MakeOptions {
            name: Some(&name),
            requirements: options.requirements.clone(),
            executable: options.executable,
            bare: options.bare,
            update: true,
            quiet: options.quiet,
            storage: options.storage,
        })
    }

    /// Destroys an orb, clearing the glow when it was the glowing one.
    pub fn destroy(&self, name: Option<&str>) -> Result<()> {
        let name = self.resolve_name(name, false, false, true)?;
        if current_orb().as_deref() == Some(name.as_str()) {
            bail!("The orb must be deactivated first for this operation");
        }
        println!("Destroying orb \"{}\"...", name.bold());
        if self.glowing().as_deref() == Some(name.as_str()) {
            let _ = fs::remove_file(self.glowing_file());
            println!("No orb shall glow now");
        }
        let orb_dir = self.path.join(&name);
        fs::remove_dir_all(&orb_dir)
            .with_context(|| format!("Unable to remove \"{}\"", orb_dir.display()))?;
        Ok(())
    }

    /// Freezes requirements: rebuilds the lockfile of every changed manifest
    /// by installing it into a throwaway orb.
    pub fn freeze(&self, path: Option<&Path>, executable: &str) -> Result<()> {
        let dir_mode = path.is_some_and(Path::is_dir);
        for requirements in self.collect_requirements(path)? {
            // In directory mode only manifests that have been frozen before
            // are refrozen.
            let skip = dir_mode
                && requirements.lockfile.as_ref().is_some_and(|lockfile| !lockfile.exists());
            if skip || !requirements.changed {
                println!("{}", requirements.status());
                continue;
            }
            println!("Freezing requirements \"{requirements}\"...");
            let tmp = tempfile::Builder::new()
                .prefix("orbs-")
                .tempdir()
                .context("Unable to create temporary directory")?;
            self.make(&MakeOptions {
                name: Some("frozen"),
                requirements: requirements.path.clone(),
                executable,
                update: true,
                quiet: true,
                storage: Some(tmp.path()),
                ..MakeOptions::default()
            })?;
        }
        Ok(())
    }

    /// Tests requirements; returns whether any manifest is outdated.
    pub fn test(&self, path: Option<&Path>, quiet: bool) -> Result<bool> {
        let mut outdated = false;
        for requirements in self.collect_requirements(path)? {
            if requirements.outdated {
                outdated = true;
            }
            if !quiet {
                println!("{}", requirements.status());
            }
        }
        Ok(outdated)
    }

    /// Shows the outdated packages of an orb.
    pub fn info(&self, name: Option<&str>) -> Result<()> {
        let name = self.resolve_name(name, true, true, true)?;
        println!("Orb \"{}\"", name.bold());
        let execution = self.activate_orb(&self.path, &name, &ActivateOptions {
            command: Some("pip list --outdated"),
            capture: true,
            ..ActivateOptions::default()
        })?;
        let outdated = execution.stdout.trim();
        println!(
            "\n{}",
            if outdated.is_empty() { "All packages are up-to-date" } else { outdated },
        );
        Ok(())
    }

    /// Resolves the requirements of a manifest path, or of every manifest in
    /// a directory (skipping dotfiles and lockfiles).
    fn collect_requirements(&self, path: Option<&Path>) -> Result<Vec<Requirements>> {
        let resolve = |path: Option<PathBuf>| {
            Requirements::resolve(RequirementsOptions {
                path,
                required: true,
                allow_outdated: true,
                ..RequirementsOptions::default()
            })
        };
        match path.filter(|path| path.is_dir()) {
            Some(dir) => {
                let mut items = Vec::new();
                for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
                    let entry = entry?;
                    let file_name = entry.file_name().to_string_lossy().to_string();
                    if !entry.file_type().is_file()
                        || file_name.starts_with('.')
                        || file_name.ends_with(".lock")
                    {
                        continue;
                    }
                    items.push(resolve(Some(entry.into_path()))?);
                }
                if items.is_empty() {
                    bail!("There are no requirements files in path \"{}\"", dir.display());
                }
                Ok(items)
            }
            None => Ok(vec![resolve(path.map(Path::to_path_buf))?]),
        }
    }
}
