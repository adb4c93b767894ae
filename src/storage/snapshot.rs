use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::memory::Tables;
use super::{StoreError, StoreResult};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    created_ms: i64,
    tables: Tables,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    created_ms: i64,
    tables: &'a Tables,
}

/// Read a snapshot file. A missing file is an empty directory, not an error.
pub(crate) fn load(path: &Path) -> StoreResult<Option<Tables>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| StoreError::Snapshot(format!("read {}: {}", path.display(), e)))?;
    let snap: Snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Snapshot(format!("parse {}: {}", path.display(), e)))?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(StoreError::Snapshot(format!("unsupported snapshot version {}", snap.version)));
    }
    debug!(target: "storage", path = %path.display(), created_ms = snap.created_ms, "snapshot loaded");
    Ok(Some(snap.tables))
}

/// Write the tables next to `path` and rename over it, so readers never see a torn file.
pub(crate) fn save(path: &Path, tables: &Tables) -> StoreResult<()> {
    let created_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
    let snap = SnapshotRef { version: SNAPSHOT_VERSION, created_ms, tables };
    let bytes = serde_json::to_vec_pretty(&snap).map_err(|e| StoreError::Snapshot(e.to_string()))?;
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Snapshot(format!("create {}: {}", dir.display(), e)))?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| StoreError::Snapshot(format!("write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::Snapshot(format!("rename {}: {}", path.display(), e)))?;
    Ok(())
}
