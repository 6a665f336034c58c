//! List sidecar lock files in a directory.

use crate::cli::ListArgs;
use hasp::config::Config;
use hasp::error::{HaspError, Result};
use hasp::exit_codes;
use hasp::locks::SidecarMetadata;
use std::fs;
use std::path::PathBuf;

/// A sidecar found by a directory scan, with whatever metadata it carries.
pub(crate) struct SidecarEntry {
    pub path: PathBuf,
    pub metadata: Option<SidecarMetadata>,
    pub is_stale: bool,
}

/// Scan `dir` for `*.lock` files, sorted by path for stable output.
///
/// Sidecars without readable metadata are included (metadata is best-effort
/// diagnostics) but never marked stale.
pub(crate) fn scan_sidecars(dir: &std::path::Path, config: &Config) -> Result<Vec<SidecarEntry>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        HaspError::UserError(format!("failed to read directory '{}': {}", dir.display(), e))
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            HaspError::UserError(format!("failed to read directory entry: {}", e))
        })?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }

        let metadata = SidecarMetadata::from_file(&path).ok();
        let is_stale = metadata
            .as_ref()
            .is_some_and(|m| m.is_stale(config.lock_stale_minutes));

        found.push(SidecarEntry {
            path,
            metadata,
            is_stale,
        });
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

pub fn cmd_list(args: ListArgs, config: &Config) -> Result<i32> {
    let sidecars = scan_sidecars(&args.dir, config)?;

    if sidecars.is_empty() {
        println!("No sidecar lock files in {}.", args.dir.display());
        return Ok(exit_codes::SUCCESS);
    }

    println!("Sidecar lock files ({}):", sidecars.len());
    println!();

    for entry in &sidecars {
        println!("  {}:", entry.path.display());
        match &entry.metadata {
            Some(meta) => {
                println!("    Owner:      {}", meta.owner);
                println!("    PID:        {}", meta.pid);
                println!("    Mode:       {}", meta.mode);
                println!("    Age:        {}", meta.age_string());
                if entry.is_stale {
                    println!(
                        "    Status:     STALE (exceeds {} min threshold)",
                        config.lock_stale_minutes
                    );
                }
            }
            None => println!("    (no readable metadata)"),
        }
        println!();
    }

    let stale_count = sidecars.iter().filter(|e| e.is_stale).count();
    if stale_count > 0 {
        println!(
            "Note: {} sidecar(s) are stale. Use `hasp clean {} --force` to remove unheld ones.",
            stale_count,
            args.dir.display()
        );
    }

    Ok(exit_codes::SUCCESS)
}
