//! Database backup staging.
//!
//! The hosting platform's disk is ephemeral, so the bot periodically
//! ships a copy of the SQLite file to an admin chat. This module only
//! stages the copy; shipping is the Telegram layer's job.

use anyhow::Result;
use chrono::Utc;
use fs_err as fs;
use std::path::{Path, PathBuf};

const BACKUP_DIR: &str = "backups";

/// How many staged copies to keep around locally.
const MAX_BACKUPS: usize = 10;

/// Copy the database file into the backup directory under a
/// timestamped name and return the copy's path.
pub fn create_backup(db_path: &str) -> Result<PathBuf> {
    create_backup_in(db_path, Path::new(BACKUP_DIR))
}

fn create_backup_in(db_path: &str, backup_dir: &Path) -> Result<PathBuf> {
    if !backup_dir.exists() {
        fs::create_dir_all(backup_dir)?;
    }

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let db_name = Path::new(db_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("edirpay.sqlite");
    let backup_path = backup_dir.join(format!("{timestamp}_{db_name}"));

    fs::copy(db_path, &backup_path)?;
    log::info!("Created backup: {}", backup_path.display());

    cleanup_old_backups(backup_dir)?;

    Ok(backup_path)
}

/// Drop the oldest staged copies beyond [`MAX_BACKUPS`]. Timestamped
/// names sort chronologically, so a name sort is enough.
fn cleanup_old_backups(backup_dir: &Path) -> Result<()> {
    let mut backups: Vec<PathBuf> = fs::read_dir(backup_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();

    backups.sort();
    backups.reverse();

    for path in backups.iter().skip(MAX_BACKUPS) {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove old backup {}: {}", path.display(), e);
        }
    }
    Ok(())
}
