//! Key pool persistence
//!
//! The pool file is a JSON document with two arrays, `free` and `paid`.
//! Writes go through a temp file + rename so a crash mid-write never leaves
//! a truncated document behind, and permissions are pinned to 0600 since
//! the file holds live API keys.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;

/// On-disk shape of the pool file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PoolsFile {
    #[serde(default)]
    pub free: Vec<String>,
    #[serde(default)]
    pub paid: Vec<String>,
}

/// Load pools from disk. A missing file is a cold start, not an error.
pub async fn load_pools(path: &Path) -> Result<PoolsFile, ApiError> {
    if !path.exists() {
        info!(path = %path.display(), "pool file not found, starting with empty pools");
        return Ok(PoolsFile::default());
    }
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ApiError::Storage(format!("reading pool file: {e}")))?;
    let pools: PoolsFile = serde_json::from_str(&contents)
        .map_err(|e| ApiError::Storage(format!("parsing pool file: {e}")))?;
    info!(
        path = %path.display(),
        free = pools.free.len(),
        paid = pools.paid.len(),
        "loaded key pools"
    );
    Ok(pools)
}

/// Persist pools atomically (temp file + rename, 0600).
pub async fn save_pools(path: &Path, pools: &PoolsFile) -> Result<(), ApiError> {
    let json = serde_json::to_string_pretty(pools)
        .map_err(|e| ApiError::Storage(format!("serializing pool file: {e}")))?;

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let tmp_path = dir.join(format!(".pools.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| ApiError::Storage(format!("writing temp pool file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| ApiError::Storage(format!("setting pool file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ApiError::Storage(format!("renaming temp pool file: {e}")))?;

    debug!(path = %path.display(), "persisted key pools");
    Ok(())
}
