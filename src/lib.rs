//! # Orbs Core Library
//!
//! This crate contains the core logic and building blocks of the `orb` tool – a manager for
//! named, reusable Python virtual environments ("orbs").
//!
//! An orb is created from a requirements manifest, activated into the current shell or a
//! scripted one, and kept reproducible through a lockfile derived from a hash of the manifest
//! chain (the manifest plus every file it transitively references).
//!
//! This library is built for the `orb` CLI, but you can also reuse it as a backend in other
//! tools.
//!
//! ## Modules Overview
//! - [`orbs`] – Orb bookkeeping: making, updating, activating, destroying, glow tracking
//! - [`reqs`] – Requirements manifest chain hashing and lockfile staleness
//! - [`shell`] – Shell flavor detection and process spawning/replacement
//! - [`templates`] – Activation script, lockfile header and completion templates
//! - [`config`] – Optional configuration file and environment overrides
//! - [`util`] – Shared utilities (paths, environment variables)

pub mod config;
pub mod orbs;
pub mod reqs;
pub mod shell;
pub mod templates;
pub mod util;

pub use config::*;
pub use orbs::*;
pub use reqs::*;
pub use shell::*;
pub use templates::*;
pub use util::*;
