//! Versioned artifact files: every write lands under a timestamped name and is
//! mirrored to a fixed "latest" name. Both go through a uniquely named temp file
//! in the target directory and a rename, so a reader never observes a half-written
//! file and concurrent writers never share a temp path.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

use crate::StoreError;

/// Suffixed names tried when a versioned file from the same second already exists.
const MAX_VERSION_SUFFIX: u32 = 100;

/// `%Y%m%d_%H%M%S`, the suffix shared by every versioned artifact.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// `report_20240301_210500.md` becomes `report_20240301_210500_2.md` for `n = 2`.
fn numbered(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", name, n),
    }
}

/// Write `bytes` to a fresh temp file beside `path` and rename it into place.
/// With `clobber` false an existing `path` is left alone and `AlreadyExists` is returned.
fn persist_bytes(path: &Path, bytes: &[u8], clobber: bool) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".artifact-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    let persisted = if clobber {
        temp.persist(path)
    } else {
        temp.persist_noclobber(path)
    };
    // a failed persist drops the temp file, which removes it
    persisted.map(|_| ()).map_err(|e| e.error)
}

fn write_versioned_blocking(dir: &Path, versioned_name: &str, latest_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    let mut versioned = None;
    for n in 0..MAX_VERSION_SUFFIX {
        let candidate = dir.join(numbered(versioned_name, n));
        match persist_bytes(&candidate, bytes, false) {
            Ok(()) => {
                versioned = Some(candidate);
                break;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("{} exists, trying next suffix", candidate.display());
            }
            Err(e) => {
                tracing::error!("Failed to write {}: {}", candidate.display(), e);
                return Err(StoreError::io(candidate, e));
            }
        }
    }
    let versioned = versioned.ok_or_else(|| {
        StoreError::io(
            dir.join(versioned_name),
            std::io::Error::new(ErrorKind::AlreadyExists, "no free versioned file name"),
        )
    })?;

    let latest = dir.join(latest_name);
    persist_bytes(&latest, bytes, true).map_err(|e| StoreError::io(&latest, e))?;
    Ok(versioned)
}

/// Write `content` to `dir/versioned_name` and `dir/latest_name`. Returns the versioned path,
/// which carries a numeric suffix when an artifact with the same name already exists.
pub async fn write_text_versioned(
    dir: &Path,
    versioned_name: &str,
    latest_name: &str,
    content: &str,
) -> Result<PathBuf, StoreError> {
    let dir_owned = dir.to_path_buf();
    let versioned_name = versioned_name.to_string();
    let latest_name = latest_name.to_string();
    let bytes = content.as_bytes().to_vec();

    tokio::task::spawn_blocking(move || write_versioned_blocking(&dir_owned, &versioned_name, &latest_name, &bytes))
        .await
        .map_err(|e| StoreError::io(dir, std::io::Error::other(e)))?
}

/// Pretty-printed JSON flavour of [`write_text_versioned`].
pub async fn write_json_versioned<T: Serialize>(
    dir: &Path,
    versioned_name: &str,
    latest_name: &str,
    value: &T,
) -> Result<PathBuf, StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    write_text_versioned(dir, versioned_name, latest_name, &json).await
}

/// `Ok(None)` when the file does not exist; errors only for unreadable or malformed files.
pub async fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
