//! Command implementations for hasp.
//!
//! The dispatcher routes CLI commands to their implementations. Commands
//! return the process exit code on success so `run` can propagate the child
//! command's own status.

mod clean;
mod hold;
mod list;
mod run;
mod status;

use crate::cli::{Cli, Command};
use hasp::config::Config;
use hasp::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => run::cmd_run(args, &config),
        Command::Hold(args) => hold::cmd_hold(args, &config),
        Command::Status(args) => status::cmd_status(args),
        Command::List(args) => list::cmd_list(args, &config),
        Command::Clean(args) => clean::cmd_clean(args, &config),
    }
}
