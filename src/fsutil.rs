use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Atomically write content to a file
///
/// Writes to a temporary sibling, syncs it, then renames over the target so
/// readers never observe a half-written CSV.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory_exists(parent)?;
    }

    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .context("Target path has no file name")?;
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut file = File::create(&temp_path).with_context(|| {
            format!("Failed to create temporary file: {}", temp_path.display())
        })?;

        file.write_all(content)
            .context("Failed to write to temporary file")?;

        file.sync_all().context("Failed to sync file to disk")?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Ensure a directory exists, creating it and all parents if needed
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}
