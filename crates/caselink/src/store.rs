use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::record::{Record, RecordUpdate};

/// One record's write failing; reported, never fatal for the batch
#[derive(Debug, Clone)]
pub struct SkippedRecord {
  pub id: String,
  pub reason: String,
}

/// Result of one bulk write-back
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
  pub updated: usize,
  pub skipped: Vec<SkippedRecord>,
}

/// The persistent document store, as the pipeline sees it.
///
/// `apply_updates` is an unordered, per-document conditional update: each
/// item succeeds or fails on its own, and re-applying identical updates
/// leaves the store unchanged.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// Full snapshot of every record in the store
  async fn load_records(&self) -> Result<Vec<Record>, StoreError>;

  /// Overwrite the clustering output fields on each target record.
  /// No other field is touched.
  async fn apply_updates(&self, updates: &[RecordUpdate]) -> Result<SyncOutcome, StoreError>;
}

/// Default store root (~/.caselink/records); `--store-root` or
/// `CASELINK_STORE_ROOT` override it
pub fn default_store_root() -> Result<PathBuf, StoreError> {
  let home = dirs::home_dir().ok_or(StoreError::NoHome)?;
  Ok(home.join(".caselink").join("records"))
}

/// File-backed store: one `<id>.json` document per record under a root
/// directory
pub struct JsonFileStore {
  root: PathBuf,
}

impl JsonFileStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn record_path(&self, id: &str) -> PathBuf {
    self.root.join(format!("{id}.json"))
  }

  /// Write a record into the store, creating the root if needed.
  /// Ingestion-side seeding; the pipeline itself only updates.
  pub async fn save(&self, record: &Record) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(&self.root).await.map_err(|e| StoreError::RootUnavailable {
      path: self.root.display().to_string(),
      source: e,
    })?;

    let body = serde_json::to_string_pretty(record).map_err(|e| StoreError::Corrupt {
      id: record.id.clone(),
      source: e,
    })?;
    tokio::fs::write(self.record_path(&record.id), body).await?;
    Ok(())
  }

  /// Apply one update in place: read, overwrite the clustering fields,
  /// write back. Failures become per-item skip reasons.
  async fn apply_one(&self, update: &RecordUpdate) -> Result<(), String> {
    let path = self.record_path(&update.id);

    let raw = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err("record not found".to_string());
      }
      Err(e) => return Err(format!("unreadable: {e}")),
    };

    let mut record: Record = match serde_json::from_str(&raw) {
      Ok(record) => record,
      Err(e) => return Err(format!("invalid JSON: {e}")),
    };

    record.cluster_label = Some(update.cluster_label);
    record.cluster_confidence = Some(update.cluster_confidence);
    record.case_id = Some(update.case_id);
    record.embedding = Some(update.embedding.clone());

    let body = serde_json::to_string_pretty(&record)
      .map_err(|e| format!("unserializable after update: {e}"))?;
    tokio::fs::write(&path, body).await.map_err(|e| format!("write failed: {e}"))?;
    Ok(())
  }
}

#[async_trait]
impl RecordStore for JsonFileStore {
  async fn load_records(&self) -> Result<Vec<Record>, StoreError> {
    let mut entries =
      tokio::fs::read_dir(&self.root).await.map_err(|e| StoreError::RootUnavailable {
        path: self.root.display().to_string(),
        source: e,
      })?;

    let mut records = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|s| s.to_str()) != Some("json") {
        continue;
      }

      let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string();
      let raw = tokio::fs::read_to_string(&path).await?;
      let record: Record =
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt { id, source: e })?;
      records.push(record);
    }

    // Directory iteration order is not stable; the snapshot order is
    records.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = records.len(), root = %self.root.display(), "loaded record snapshot");
    Ok(records)
  }

  async fn apply_updates(&self, updates: &[RecordUpdate]) -> Result<SyncOutcome, StoreError> {
    if updates.is_empty() {
      return Ok(SyncOutcome::default());
    }

    let metadata =
      tokio::fs::metadata(&self.root).await.map_err(|e| StoreError::RootUnavailable {
        path: self.root.display().to_string(),
        source: e,
      })?;
    if !metadata.is_dir() {
      return Err(StoreError::RootUnavailable {
        path: self.root.display().to_string(),
        source: std::io::Error::other("not a directory"),
      });
    }

    // Unordered on purpose: one malformed document must not abort the batch
    let results = join_all(updates.iter().map(|update| self.apply_one(update))).await;

    let mut outcome = SyncOutcome::default();
    for (update, result) in updates.iter().zip(results) {
      match result {
        Ok(()) => outcome.updated += 1,
        Err(reason) => {
          warn!(id = %update.id, %reason, "skipped record during sync");
          outcome.skipped.push(SkippedRecord { id: update.id.clone(), reason });
        }
      }
    }

    Ok(outcome)
  }
}
