//! File-system resource helpers.
use anyhow::{Context as _, Result};
use std::path::Path;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Remove the file at `path`, including a broken symlink. Does nothing if
/// there is nothing to remove.
///
/// Returns whether something was removed.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<bool> {
    if path.symlink_metadata().is_err() {
        return Ok(false);
    }
    std::fs::remove_file(path).with_context(|| format!("remove existing: {}", path.display()))?;
    Ok(true)
}

/// Write `content` to `path` by writing a sibling temporary file and
/// renaming it over the target, so readers never see a partial file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("no file name: {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, content).with_context(|| format!("write: {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        // Leave nothing behind if the rename fails.
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("rename into place: {}", path.display()));
    }
    Ok(())
}
