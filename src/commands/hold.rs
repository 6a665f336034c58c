//! Hold a path lock for a fixed duration.

use crate::cli::HoldArgs;
use hasp::config::Config;
use hasp::error::Result;
use hasp::exit_codes;
use hasp::locks::FileLockManager;
use std::io::Write;
use std::time::Duration;

pub fn cmd_hold(args: HoldArgs, config: &Config) -> Result<i32> {
    let manager = FileLockManager::with_poll_interval(config.poll_interval());
    let mut handle = manager.acquire_path_lock(&args.path, !args.shared)?;

    // Announce on stdout so callers (scripts, tests) can synchronize on the
    // grant rather than guessing with sleeps.
    println!("held");
    let _ = std::io::stdout().flush();

    std::thread::sleep(Duration::from_millis(args.duration_ms));
    handle.close()?;
    Ok(exit_codes::SUCCESS)
}
