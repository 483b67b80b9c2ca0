use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;
use crate::model::issue::{IssueSnapshot, StoredIssue};
use crate::util::fsync::write_atomic;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    issues: BTreeMap<String, StoredIssue>,
}

/// Durable mapping from issue key to the last snapshot that was printed.
///
/// Every mutation is flushed to disk before it returns. A failed flush leaves
/// the in-memory view untouched, so the caller sees the same state it would
/// after a restart.
pub struct IssueStore {
    path: PathBuf,
    data: StoreData,
}

impl IssueStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            if contents.trim().is_empty() {
                StoreData::default()
            } else {
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            StoreData::default()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.issues.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StoredIssue> {
        self.data.issues.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, snapshot: IssueSnapshot) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.issues.insert(
            key.into(),
            StoredIssue {
                snapshot,
                stored_at: Utc::now(),
            },
        );
        self.commit(next)
    }

    pub fn put_many(
        &mut self,
        snapshots: impl IntoIterator<Item = IssueSnapshot>,
    ) -> Result<usize, StoreError> {
        self.put_many_at(snapshots, Utc::now())
    }

    pub fn put_many_at(
        &mut self,
        snapshots: impl IntoIterator<Item = IssueSnapshot>,
        stored_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut next = self.data.clone();
        let mut count = 0;
        for snapshot in snapshots {
            next.issues
                .insert(snapshot.key.clone(), StoredIssue { snapshot, stored_at });
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }
        self.commit(next)?;
        Ok(count)
    }

    /// Put back what was stored for each key before a write, removing keys
    /// that had no entry.
    pub fn restore(&mut self, previous: Vec<(String, Option<StoredIssue>)>) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        for (key, entry) in previous {
            match entry {
                Some(entry) => {
                    next.issues.insert(key, entry);
                }
                None => {
                    next.issues.remove(&key);
                }
            }
        }
        self.commit(next)
    }

    /// Drop entries stored before `cutoff` unless their key is in `keep`.
    pub fn prune(&mut self, cutoff: DateTime<Utc>, keep: &HashSet<String>) -> Result<usize, StoreError> {
        let mut next = self.data.clone();
        next.issues
            .retain(|key, entry| entry.stored_at >= cutoff || keep.contains(key));
        let removed = self.data.issues.len() - next.issues.len();
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }

    fn commit(&mut self, next: StoreData) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&next).map_err(StoreError::Encode)?;
        write_atomic(&self.path, &json).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn snapshot(key: &str, priority: &str) -> IssueSnapshot {
        IssueSnapshot {
            key: key.into(),
            summary: format!("Summary of {key}"),
            detail: None,
            issue_type: Some("Task".into()),
            priority: Some(priority.into()),
            reporter: "bob".into(),
            created: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = IssueStore::open(dir.path().join("issues.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.get("CI-1").is_none());
    }

    #[test]
    fn put_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.json");

        let mut store = IssueStore::open(&path).unwrap();
        store.put("CI-1", snapshot("CI-1", "Minor")).unwrap();
        drop(store);

        let reopened = IssueStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("CI-1").unwrap().snapshot.priority.as_deref(),
            Some("Minor")
        );
    }

    #[test]
    fn put_replaces_the_single_entry_per_key() {
        let dir = tempdir().unwrap();
        let mut store = IssueStore::open(dir.path().join("issues.json")).unwrap();

        store.put("CI-1", snapshot("CI-1", "Minor")).unwrap();
        store.put("CI-1", snapshot("CI-1", "Critical")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("CI-1").unwrap().snapshot.priority.as_deref(),
            Some("Critical")
        );
    }

    #[test]
    fn put_many_writes_every_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.json");
        let mut store = IssueStore::open(&path).unwrap();

        let written = store
            .put_many(vec![snapshot("CI-1", "Minor"), snapshot("CI-2", "Major")])
            .unwrap();

        assert_eq!(written, 2);
        let reopened = IssueStore::open(&path).unwrap();
        assert!(reopened.get("CI-1").is_some());
        assert!(reopened.get("CI-2").is_some());
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.json");
        let mut store = IssueStore::open(&path).unwrap();
        // A directory squatting on the target path makes the rename fail.
        std::fs::create_dir(&path).unwrap();

        let result = store.put("CI-1", snapshot("CI-1", "Minor"));

        assert!(matches!(result, Err(StoreError::Write { .. })));
        assert!(store.get("CI-1").is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            IssueStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn restore_reinstates_previous_entries() {
        let dir = tempdir().unwrap();
        let mut store = IssueStore::open(dir.path().join("issues.json")).unwrap();
        store.put("CI-1", snapshot("CI-1", "Minor")).unwrap();
        let before = store.get("CI-1").cloned();

        store
            .put_many(vec![snapshot("CI-1", "Critical"), snapshot("CI-2", "Major")])
            .unwrap();
        store
            .restore(vec![("CI-1".into(), before), ("CI-2".into(), None)])
            .unwrap();

        assert_eq!(
            store.get("CI-1").unwrap().snapshot.priority.as_deref(),
            Some("Minor")
        );
        assert!(store.get("CI-2").is_none());
    }

    #[test]
    fn prune_drops_old_entries_not_kept() {
        let dir = tempdir().unwrap();
        let mut store = IssueStore::open(dir.path().join("issues.json")).unwrap();
        let now = Utc::now();
        let old = now - Duration::days(40);

        store
            .put_many_at(vec![snapshot("OLD-1", "Minor"), snapshot("OLD-2", "Minor")], old)
            .unwrap();
        store.put_many_at(vec![snapshot("NEW-1", "Minor")], now).unwrap();

        let keep = HashSet::from(["OLD-2".to_string()]);
        let removed = store.prune(now - Duration::days(30), &keep).unwrap();

        assert_eq!(removed, 1);
        assert!(store.get("OLD-1").is_none());
        assert!(store.get("OLD-2").is_some());
        assert!(store.get("NEW-1").is_some());
    }
}
