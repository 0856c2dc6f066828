//! Periodic local snapshot persistence
//!
//! A [`SnapshotWriter`] is scheduled like a session. On every tick it asks a
//! [`SnapshotSource`] for a flat document of field name → primitive value
//! and overwrites a JSON file with it:
//!
//! ```json
//! {
//!   "connected": true,
//!   "frames_sent": 1520,
//!   "thread_state": "streaming"
//! }
//! ```
//!
//! Writes go to a temp file in the same directory followed by a rename, so
//! readers never observe a partially written document.

use crate::error::{Error, Result};
use crate::scheduler::Tickable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Primitive snapshot value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Flat document keyed by field name (sorted for stable output)
pub type Snapshot = BTreeMap<String, SnapshotValue>;

/// Anything that can describe itself as a [`Snapshot`]
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

/// Write `snapshot` to `path` as pretty JSON, replacing the previous document
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }

    let serialized = serde_json::to_vec_pretty(snapshot)?;
    let temp_path = temp_path_for(path)?;
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Read a snapshot document back
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let contents = fs::read(path)?;
    Ok(serde_json::from_slice(&contents)?)
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidParameter(format!("{} is not a file path", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(format!(".{}.tmp", std::process::id()));
    Ok(path.with_file_name(temp_name))
}

/// Scheduled task that persists snapshots
pub struct SnapshotWriter {
    path: PathBuf,
    source: Arc<dyn SnapshotSource>,
    paused: bool,
    writes: u64,
    failures: u64,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            path: path.into(),
            source,
            paused: false,
            writes: 0,
            failures: 0,
        }
    }

    /// Take and persist one snapshot
    pub fn write_now(&mut self) -> Result<()> {
        let snapshot = self.source.snapshot();
        write_snapshot(&self.path, &snapshot)?;
        self.writes += 1;
        Ok(())
    }
}

impl Tickable for SnapshotWriter {
    fn name(&self) -> &str {
        "snapshot-writer"
    }

    fn tick(&mut self) {
        if self.paused {
            return;
        }
        if let Err(e) = self.write_now() {
            self.failures += 1;
            // Persistence is best-effort; keep the first failure visible
            if self.failures == 1 {
                log::warn!("Failed to write snapshot {}: {}", self.path.display(), e);
            } else {
                log::debug!("Failed to write snapshot {}: {}", self.path.display(), e);
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.paused = false;
        Ok(())
    }

    fn shutdown(&mut self) {
        log::debug!(
            "Snapshot writer stopped ({} writes, {} failures)",
            self.writes,
            self.failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Counter {
        value: Mutex<i64>,
    }

    impl SnapshotSource for Counter {
        fn snapshot(&self) -> Snapshot {
            let mut value = self.value.lock();
            *value += 1;
            let mut snapshot = Snapshot::new();
            snapshot.insert("count".into(), SnapshotValue::Int(*value));
            snapshot.insert("label".into(), SnapshotValue::Text("target".into()));
            snapshot.insert("distance".into(), SnapshotValue::Float(1.25));
            snapshot.insert("locked".into(), SnapshotValue::Bool(false));
            snapshot
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let source = Counter {
            value: Mutex::new(0),
        };
        write_snapshot(&path, &source.snapshot()).unwrap();

        let snapshot = read_snapshot(&path).unwrap();
        assert_eq!(snapshot.get("count"), Some(&SnapshotValue::Int(1)));
        assert_eq!(snapshot.get("distance"), Some(&SnapshotValue::Float(1.25)));
        assert_eq!(snapshot.get("locked"), Some(&SnapshotValue::Bool(false)));
    }

    #[test]
    fn test_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let mut writer = SnapshotWriter::new(
            &path,
            Arc::new(Counter {
                value: Mutex::new(0),
            }),
        );
        writer.write_now().unwrap();
        writer.write_now().unwrap();
        writer.write_now().unwrap();

        let snapshot = read_snapshot(&path).unwrap();
        assert_eq!(snapshot.get("count"), Some(&SnapshotValue::Int(3)));

        // No temp files left behind
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_paused_writer_skips_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut writer = SnapshotWriter::new(
            &path,
            Arc::new(Counter {
                value: Mutex::new(0),
            }),
        );

        writer.pause().unwrap();
        writer.tick();
        assert!(!path.exists());

        writer.resume().unwrap();
        writer.tick();
        assert!(path.exists());
    }

    #[test]
    fn test_json_is_flat_object() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("a".into(), SnapshotValue::Int(1));
        snapshot.insert("b".into(), SnapshotValue::Text("x".into()));
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"a":1,"b":"x"}"#);
    }
}
