//! Remove stale, unheld sidecar lock files.

use crate::cli::CleanArgs;
use crate::commands::list::scan_sidecars;
use fs2::FileExt;
use hasp::config::Config;
use hasp::error::Result;
use hasp::exit_codes;
use std::fs::OpenOptions;
use std::path::Path;

/// True when no process currently holds an advisory lock on the sidecar.
///
/// Probes with a non-blocking exclusive lock on the existing file; any
/// failure is treated as "held" so clean never removes a live lock.
fn is_unheld(sidecar: &Path) -> bool {
    let Ok(file) = OpenOptions::new()
        .read(true)
        .write(true)
        .truncate(false)
        .open(sidecar)
    else {
        return false;
    };
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            true
        }
        Err(_) => false,
    }
}

pub fn cmd_clean(args: CleanArgs, config: &Config) -> Result<i32> {
    let sidecars = scan_sidecars(&args.dir, config)?;

    let mut candidates = 0;
    let mut removed = 0;
    for entry in &sidecars {
        if !entry.is_stale || !is_unheld(&entry.path) {
            continue;
        }
        candidates += 1;

        if args.force {
            match std::fs::remove_file(&entry.path) {
                Ok(()) => {
                    removed += 1;
                    println!("Removed {}", entry.path.display());
                }
                Err(e) => eprintln!("Warning: failed to remove '{}': {}", entry.path.display(), e),
            }
        } else {
            println!("Would remove {}", entry.path.display());
        }
    }

    if candidates == 0 {
        println!("Nothing to clean in {}.", args.dir.display());
    } else if !args.force {
        println!();
        println!(
            "Dry run: {} stale sidecar(s) found. Re-run with --force to remove.",
            candidates
        );
    } else {
        println!();
        println!("Removed {} of {} stale sidecar(s).", removed, candidates);
    }

    Ok(exit_codes::SUCCESS)
}
