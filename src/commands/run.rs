//! Run a command while holding a path lock.

use crate::cli::RunArgs;
use hasp::config::Config;
use hasp::error::{HaspError, Result};
use hasp::exit_codes;
use hasp::locks::FileLockManager;
use std::process::Command;
use std::time::Duration;

pub fn cmd_run(args: RunArgs, config: &Config) -> Result<i32> {
    let manager = FileLockManager::with_poll_interval(config.poll_interval());
    let exclusive = !args.shared;

    let mut handle = match args.timeout_ms {
        Some(ms) => {
            manager.try_acquire_path_lock(&args.path, exclusive, Duration::from_millis(ms))?
        }
        None => manager.acquire_path_lock(&args.path, exclusive)?,
    };

    let status = Command::new(&args.command[0])
        .args(&args.command[1..])
        .status()
        .map_err(|e| HaspError::UserError(format!("failed to run '{}': {}", args.command[0], e)));

    // Release before propagating any spawn error so the lock never outlives
    // the command.
    handle.close()?;

    let status = status?;
    Ok(status.code().unwrap_or(exit_codes::USER_ERROR))
}
