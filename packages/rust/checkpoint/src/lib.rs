//! Date-partitioned checkpoint store.
//!
//! The [`CheckpointStore`] persists pipeline state as JSON or raw-byte blobs
//! addressed by `(base_folder, date, filename)`, laid out on disk as
//! `<root>/<base_folder>/<YYYY-MM-DD>/<filename>`.
//!
//! **Access rules:**
//! - One curator per date-partitioned instance; last-writer-wins, no locking.
//! - Checkpoints are never deleted by the pipeline — "restart" only clears
//!   the in-memory view, historical dates stay addressable.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use clipdesk_shared::{ClipdeskError, Result};

/// Filesystem-backed blob store for checkpoint records.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    tz: FixedOffset,
}

impl CheckpointStore {
    /// Create a store rooted at `root`, partitioning by the deployment's
    /// fixed UTC offset (hours).
    pub fn new(root: impl Into<PathBuf>, tz_offset_hours: i32) -> Result<Self> {
        let tz = FixedOffset::east_opt(tz_offset_hours * 3600).ok_or_else(|| {
            ClipdeskError::config(format!("invalid timezone offset: {tz_offset_hours}h"))
        })?;
        Ok(Self {
            root: root.into(),
            tz,
        })
    }

    /// Today's partition date in the deployment time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Directory for one `(base_folder, date)` partition.
    pub fn partition_dir(&self, base_folder: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(base_folder)
            .join(date.format("%Y-%m-%d").to_string())
    }

    fn file_path(&self, base_folder: &str, date: NaiveDate, name: &str) -> PathBuf {
        self.partition_dir(base_folder, date).join(name)
    }

    /// Whether a checkpoint file exists.
    pub fn exists(&self, base_folder: &str, date: NaiveDate, name: &str) -> bool {
        self.file_path(base_folder, date, name).exists()
    }

    // -----------------------------------------------------------------------
    // JSON records
    // -----------------------------------------------------------------------

    /// Load a JSON checkpoint record. Returns `None` if absent.
    pub fn load_json<T: DeserializeOwned>(
        &self,
        base_folder: &str,
        date: NaiveDate,
        name: &str,
    ) -> Result<Option<T>> {
        let path = self.file_path(base_folder, date, name);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&path).map_err(|e| ClipdeskError::io(&path, e))?;
        let value = serde_json::from_str(&content).map_err(|e| {
            ClipdeskError::checkpoint(format!("invalid JSON in {}: {e}", path.display()))
        })?;
        Ok(Some(value))
    }

    /// Save a JSON checkpoint record (pretty-printed, atomic).
    pub fn save_json<T: Serialize>(
        &self,
        base_folder: &str,
        date: NaiveDate,
        name: &str,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| {
            ClipdeskError::checkpoint(format!("JSON serialization failed: {e}"))
        })?;
        self.write_atomic(base_folder, date, name, json.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Binary blobs (report documents)
    // -----------------------------------------------------------------------

    /// Load a binary checkpoint blob. Returns `None` if absent.
    pub fn load_bytes(
        &self,
        base_folder: &str,
        date: NaiveDate,
        name: &str,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.file_path(base_folder, date, name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| ClipdeskError::io(&path, e))?;
        Ok(Some(bytes))
    }

    /// Save a binary checkpoint blob (atomic).
    pub fn save_bytes(
        &self,
        base_folder: &str,
        date: NaiveDate,
        name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.write_atomic(base_folder, date, name, bytes)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Write to a temp file in the partition directory, then rename.
    fn write_atomic(
        &self,
        base_folder: &str,
        date: NaiveDate,
        name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let dir = self.partition_dir(base_folder, date);
        std::fs::create_dir_all(&dir).map_err(|e| ClipdeskError::io(&dir, e))?;

        let target = dir.join(name);
        let temp = dir.join(format!(".{name}.{}.tmp", Uuid::now_v7()));

        std::fs::write(&temp, bytes).map_err(|e| ClipdeskError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| ClipdeskError::io(&target, e))?;

        debug!(
            path = %target.display(),
            size = bytes.len(),
            sha256 = %short_digest(bytes),
            "wrote checkpoint"
        );
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// First 12 hex chars of the SHA-256 digest, for log lines.
fn short_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let full = format!("{:x}", hasher.finalize());
    full[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        titles: Vec<String>,
    }

    fn test_store() -> (CheckpointStore, PathBuf) {
        let tmp = std::env::temp_dir().join(format!("clipdesk_ckpt_{}", Uuid::now_v7()));
        (CheckpointStore::new(&tmp, 8).expect("store"), tmp)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("date")
    }

    #[test]
    fn json_roundtrip_and_absent() {
        let (store, tmp) = test_store();
        let d = date("2025-08-11");

        let missing: Option<Record> = store.load_json("daily", d, "r.json").unwrap();
        assert!(missing.is_none());

        let record = Record {
            titles: vec!["A".into(), "B".into()],
        };
        store.save_json("daily", d, "r.json", &record).unwrap();

        let loaded: Record = store.load_json("daily", d, "r.json").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.exists("daily", d, "r.json"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bytes_roundtrip() {
        let (store, tmp) = test_store();
        let d = date("2025-08-11");

        let blob = vec![0u8, 1, 2, 255];
        store.save_bytes("daily", d, "report.docx", &blob).unwrap();
        let loaded = store.load_bytes("daily", d, "report.docx").unwrap().unwrap();
        assert_eq!(loaded, blob);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn last_writer_wins() {
        let (store, tmp) = test_store();
        let d = date("2025-08-11");

        store
            .save_json("daily", d, "r.json", &Record { titles: vec!["old".into()] })
            .unwrap();
        store
            .save_json("daily", d, "r.json", &Record { titles: vec!["new".into()] })
            .unwrap();

        let loaded: Record = store.load_json("daily", d, "r.json").unwrap().unwrap();
        assert_eq!(loaded.titles, vec!["new"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn dates_partition_independently() {
        let (store, tmp) = test_store();

        store
            .save_json(
                "daily",
                date("2025-08-10"),
                "r.json",
                &Record { titles: vec!["yesterday".into()] },
            )
            .unwrap();
        store
            .save_json(
                "daily",
                date("2025-08-11"),
                "r.json",
                &Record { titles: vec!["today".into()] },
            )
            .unwrap();

        let old: Record = store
            .load_json("daily", date("2025-08-10"), "r.json")
            .unwrap()
            .unwrap();
        assert_eq!(old.titles, vec!["yesterday"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (store, tmp) = test_store();
        let d = date("2025-08-11");
        store.save_bytes("daily", d, "report.docx", b"blob").unwrap();

        for entry in std::fs::read_dir(store.partition_dir("daily", d)).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "temp file left behind: {name}");
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_offset_rejected() {
        let result = CheckpointStore::new("/tmp/x", 99);
        assert!(result.is_err());
    }
}
