//! CLI argument parsing for hasp.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hasp: run commands and inspect state under cross-process path locks.
///
/// For a protected path P, coordination happens on a sidecar `P.lock` held
/// via OS advisory locks, so P itself can be freely created, replaced, or
/// deleted while coordination continues.
#[derive(Parser, Debug)]
#[command(name = "hasp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file (falls back to $HASP_CONFIG, then defaults).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for hasp.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command while holding a lock on a path.
    ///
    /// Acquires the lock, spawns the command, waits for it, releases the
    /// lock, and exits with the command's own exit code.
    Run(RunArgs),

    /// Hold a lock on a path for a fixed duration.
    ///
    /// Prints `held` to stdout once the lock is granted. Useful for
    /// diagnostics and as a cross-process fixture in scripts and tests.
    Hold(HoldArgs),

    /// Show the lock status of a path.
    ///
    /// Reports sidecar presence, holder metadata if available, and whether
    /// some process currently holds the lock.
    Status(StatusArgs),

    /// List sidecar lock files in a directory.
    List(ListArgs),

    /// Remove stale, unheld sidecar lock files from a directory.
    ///
    /// Without --force this is a dry run that only reports what would be
    /// removed.
    Clean(CleanArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to lock.
    pub path: PathBuf,

    /// Acquire a shared (read) lock instead of an exclusive one.
    #[arg(long)]
    pub shared: bool,

    /// Give up after this many milliseconds instead of waiting indefinitely.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Command (and arguments) to run while the lock is held.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Path to lock.
    pub path: PathBuf,

    /// Acquire a shared (read) lock instead of an exclusive one.
    #[arg(long)]
    pub shared: bool,

    /// How long to hold the lock, in milliseconds.
    #[arg(long)]
    pub duration_ms: u64,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Path to inspect.
    pub path: PathBuf,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Directory to scan for `*.lock` sidecars.
    pub dir: PathBuf,
}

/// Arguments for the `clean` command.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Directory to scan for `*.lock` sidecars.
    pub dir: PathBuf,

    /// Actually remove stale sidecars instead of reporting them.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
