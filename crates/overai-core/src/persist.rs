use std::path::Path;

use serde::Serialize;

use crate::{Error, Result};

/// Serialize `value` as pretty JSON and replace `path` atomically.
///
/// Parent directories are created on demand. The target is only ever
/// replaced by rename, so a failed save leaves the previous file intact.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::PersistenceFailure(format!("failed to serialize {}: {e}", path.display())))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::PersistenceFailure(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json).map_err(|e| {
        Error::PersistenceFailure(format!("failed to write {}: {e}", tmp_path.display()))
    })?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::PersistenceFailure(format!(
            "failed to replace {}: {e}",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), "Saved to disk");
    Ok(())
}
