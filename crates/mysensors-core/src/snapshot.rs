//! Whole-registry persistence as a JSON snapshot.

use crate::model::Node;
use crate::{GatewayError, Network, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    nodes: Vec<Node>,
}

impl Network {
    /// Replace the registry with the contents of `path`.
    ///
    /// A missing or empty file leaves the registry as it is.
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no state file, starting empty");
                return Ok(());
            }
            Err(e) => return Err(read_error(path, e)),
        };
        if raw.trim().is_empty() {
            debug!(path = %path.display(), "state file is empty");
            return Ok(());
        }
        let snap: Snapshot = serde_json::from_str(&raw).map_err(|e| read_error(path, e))?;
        if snap.version > SNAPSHOT_VERSION {
            debug!(version = snap.version, "state file written by a newer version");
        }

        let mut table = BTreeMap::new();
        for mut node in snap.nodes {
            // The map key is authoritative only through the sensor's own id.
            node.sensors = std::mem::take(&mut node.sensors)
                .into_values()
                .map(|s| (s.id, s))
                .collect();
            table.insert(node.id, node);
        }
        info!(path = %path.display(), nodes = table.len(), "loaded state");
        self.replace_all(table);
        Ok(())
    }

    /// Write the whole registry to `path` via a temporary file and rename.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let _guard = self
            .save_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let json = {
            let nodes = self.read();
            let snap = SnapshotRef {
                version: SNAPSHOT_VERSION,
                nodes: nodes.values().collect(),
            };
            serde_json::to_string_pretty(&snap).map_err(|e| write_error(path, e))?
        };

        let tmp = temp_path(path);
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(write_error(path, e));
        }
        info!(path = %path.display(), "saved state");
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    nodes: Vec<&'a Node>,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> GatewayError {
    GatewayError::SnapshotRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> GatewayError {
    GatewayError::SnapshotWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
