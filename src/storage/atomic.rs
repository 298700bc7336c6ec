//! Atomic file replacement shared by every durable store.
//!
//! Writes go to a sibling `<name>.tmp`, are synced, then renamed over the
//! canonical path. A reader sees either the previous file or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{RalphError, Result};

/// Path of the temporary sibling used while replacing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `contents` atomically.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| RalphError::persistence(parent, e))?;
    }

    let tmp = temp_path(path);
    let result = write_and_sync(&tmp, contents).and_then(|_| fs::rename(&tmp, path));

    if let Err(e) = result {
        // Leftover tmp is harmless but noisy
        let _ = fs::remove_file(&tmp);
        return Err(RalphError::persistence(path, e));
    }
    Ok(())
}

fn write_and_sync(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Read a file, distinguishing "absent" from "unreadable".
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RalphError::persistence(path, e)),
    }
}
