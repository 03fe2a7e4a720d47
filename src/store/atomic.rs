//! Owner-only directory creation and temp-then-rename file replacement.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use crate::core::errors::{Result, UnError};

/// Mode for the policy directory.
pub const DIR_MODE: u32 = 0o700;
/// Mode for the policy document.
pub const FILE_MODE: u32 = 0o600;

/// Create `dir` (and missing parents) restricted to the owner. Existing
/// directories are left as they are.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(dir)
        .map_err(|e| UnError::persistence(dir, format!("cannot create directory: {e}")))
}

/// Replace `final_path` with `bytes` so readers observe either the old or the
/// new content, never a prefix.
///
/// The temp file is created next to the destination (same filesystem) with
/// owner-only permissions, synced, then renamed over the destination.
pub fn atomic_write(final_path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = final_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staged = tempfile::Builder::new()
        .prefix(".policy-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| UnError::persistence(final_path, format!("cannot create temp file: {e}")))?;

    set_mode(staged.path(), FILE_MODE)
        .map_err(|e| UnError::persistence(final_path, format!("cannot restrict temp file: {e}")))?;

    staged
        .as_file_mut()
        .write_all(bytes)
        .map_err(|e| UnError::persistence(final_path, format!("cannot write temp file: {e}")))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| UnError::persistence(final_path, format!("cannot sync temp file: {e}")))?;

    staged
        .persist(final_path)
        .map_err(|e| UnError::persistence(final_path, format!("cannot rename into place: {}", e.error)))?;

    set_mode(final_path, FILE_MODE)
        .map_err(|e| UnError::persistence(final_path, format!("cannot set permissions: {e}")))?;
    Ok(())
}

/// Set Unix permission bits; no-op elsewhere.
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// Permission bits of `path` (always `None` off Unix).
pub fn mode_of(path: &Path) -> std::io::Result<Option<u32>> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Ok(Some(fs::metadata(path)?.permissions().mode() & 0o777))
    }
    #[cfg(not(unix))]
    {
        let _ = fs::metadata(path)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_correct_content() {
        let tmp = TempDir::new().unwrap();
        let final_path = tmp.path().join("config.json");
        atomic_write(&final_path, b"{\"test\": true}").unwrap();
        assert_eq!(fs::read(&final_path).unwrap(), b"{\"test\": true}");

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file should be renamed away");
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let final_path = tmp.path().join("config.json");
        fs::write(&final_path, "old").unwrap();
        atomic_write(&final_path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&final_path).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn written_file_and_created_dir_are_owner_only() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        ensure_private_dir(&dir).unwrap();
        assert_eq!(mode_of(&dir).unwrap(), Some(DIR_MODE));

        let file = dir.join("config.json");
        atomic_write(&file, b"{}").unwrap();
        assert_eq!(mode_of(&file).unwrap(), Some(FILE_MODE));
    }

    #[test]
    fn failed_rename_leaves_destination_untouched() {
        let tmp = TempDir::new().unwrap();
        // A non-empty directory at the destination cannot be replaced by a file.
        let final_path = tmp.path().join("config.json");
        fs::create_dir(&final_path).unwrap();
        fs::write(final_path.join("keep"), "x").unwrap();

        let err = atomic_write(&final_path, b"{}").unwrap_err();
        assert_eq!(err.code(), "UN-2002");
        assert!(final_path.join("keep").exists());
    }
}
