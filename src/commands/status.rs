//! Show the lock status of a path.

use crate::cli::StatusArgs;
use fs2::FileExt;
use hasp::error::{HaspError, Result};
use hasp::exit_codes;
use hasp::locks::{SidecarMetadata, sidecar_path};
use std::fs::OpenOptions;
use std::path::Path;

fn probe_err(sidecar: &Path, source: std::io::Error) -> HaspError {
    HaspError::Io {
        path: sidecar.to_path_buf(),
        source,
    }
}

pub fn cmd_status(args: StatusArgs) -> Result<i32> {
    let sidecar = sidecar_path(&args.path);

    if !sidecar.exists() {
        println!("{}: unlocked (no sidecar)", args.path.display());
        return Ok(exit_codes::SUCCESS);
    }

    println!("{}: sidecar present", args.path.display());
    match SidecarMetadata::from_file(&sidecar) {
        Ok(meta) => {
            println!("  Owner:      {}", meta.owner);
            println!("  PID:        {}", meta.pid);
            println!("  Mode:       {}", meta.mode);
            println!(
                "  Acquired:   {}",
                meta.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Age:        {}", meta.age_string());
        }
        Err(_) => println!("  (no readable metadata)"),
    }

    // Probe without creating or deleting anything: open the existing sidecar
    // and attempt a non-blocking exclusive lock.
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .truncate(false)
        .open(&sidecar)
        .map_err(|e| probe_err(&sidecar, e))?;

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            println!("  Held:       no (sidecar is not locked by any process)");
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            println!("  Held:       yes");
        }
        Err(e) => return Err(probe_err(&sidecar, e)),
    }

    Ok(exit_codes::SUCCESS)
}
