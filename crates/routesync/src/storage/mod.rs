//! Local record storage for routesync.
//!
//! The whole collection is persisted as one JSON array. Every mutation is a
//! read-modify-write of that array, and all of them pass through a single
//! async mutex so interleaved tasks cannot lose each other's writes across a
//! suspension point. There is no cross-process locking.

mod patch;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{NewRecord, RouteRecord};

pub use patch::RecordPatch;

/// Where records are kept.
#[derive(Debug)]
enum Backend {
    /// JSON file at the store's path.
    File,
    /// Process memory, for tests and throwaway sessions.
    Memory(Vec<RouteRecord>),
}

/// Durable on-device persistence of route records.
///
/// Pure CRUD: no business rules beyond id uniqueness. Callers must not assume
/// a failed write was partially applied; the file is replaced atomically via
/// a temp file and rename.
#[derive(Debug)]
pub struct LocalRecordStore {
    /// Path to the records file.
    path: PathBuf,
    /// Write pretty-printed JSON.
    pretty: bool,
    /// Serializes every read-modify-write.
    backend: Mutex<Backend>,
}

impl LocalRecordStore {
    /// Open a store backed by the JSON file at `path`.
    ///
    /// Nothing is touched on disk until the first write; a missing file reads
    /// as an empty collection.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!("Using record store at {}", path.display());
        Self {
            path,
            pretty: true,
            backend: Mutex::new(Backend::File),
        }
    }

    /// Create an in-memory store for testing.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            pretty: false,
            backend: Mutex::new(Backend::Memory(Vec::new())),
        }
    }

    /// Choose between pretty-printed and compact JSON.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Get the path to the records file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List all stored records in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the records file cannot be read or parsed.
    pub async fn list(&self) -> Result<Vec<RouteRecord>> {
        let backend = self.backend.lock().await;
        self.load(&backend).await
    }

    /// Get a record by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the records file cannot be read or parsed.
    pub async fn get(&self, id: &str) -> Result<Option<RouteRecord>> {
        let records = self.list().await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    /// Count stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the records file cannot be read or parsed.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    /// Append a new record.
    ///
    /// Assigns a time-derived id that is unique within the store, stamps the
    /// creation time and marks the record as not uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the records file cannot be read or written.
    pub async fn append(&self, new: NewRecord) -> Result<RouteRecord> {
        let mut backend = self.backend.lock().await;
        let mut records = self.load(&backend).await?;

        let now = Utc::now();
        let record = new.into_record(next_id(&records, now), now);
        records.push(record.clone());

        self.save(&mut backend, records).await?;
        info!("Saved record {}", record.id);
        Ok(record)
    }

    /// Apply a patch to the record with the given id.
    ///
    /// Returns the record as stored after the patch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id, or a storage error
    /// if the file cannot be read or written.
    pub async fn update(&self, id: &str, patch: &RecordPatch) -> Result<RouteRecord> {
        self.update_checked(id, |_| Ok(()), patch).await
    }

    /// Apply a patch only if `check` accepts the record as currently stored.
    ///
    /// The check runs inside the same critical section as the write, so it
    /// sees the latest stored copy rather than a caller's snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id, whatever `check`
    /// returns, or a storage error if the file cannot be read or written.
    pub async fn update_checked<F>(
        &self,
        id: &str,
        check: F,
        patch: &RecordPatch,
    ) -> Result<RouteRecord>
    where
        F: FnOnce(&RouteRecord) -> Result<()>,
    {
        let mut backend = self.backend.lock().await;
        let mut records = self.load(&backend).await?;

        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound { id: id.to_string() })?;
        check(record)?;
        patch.apply(record);
        let updated = record.clone();

        self.save(&mut backend, records).await?;
        debug!("Updated record {}", id);
        Ok(updated)
    }

    /// Remove the record with the given id.
    ///
    /// Returns `true` if a record was removed, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the records file cannot be read or written.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut backend = self.backend.lock().await;
        let mut records = self.load(&backend).await?;

        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }

        self.save(&mut backend, records).await?;
        info!("Deleted record {}", id);
        Ok(true)
    }

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the records file exists and cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        let mut backend = self.backend.lock().await;
        match &mut *backend {
            Backend::Memory(records) => records.clear(),
            Backend::File => match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(Error::StorageWrite {
                        path: self.path.clone(),
                        source,
                    })
                }
            },
        }
        info!("Cleared all records");
        Ok(())
    }

    async fn load(&self, backend: &Backend) -> Result<Vec<RouteRecord>> {
        match backend {
            Backend::Memory(records) => Ok(records.clone()),
            Backend::File => self.read_file().await,
        }
    }

    async fn save(&self, backend: &mut Backend, records: Vec<RouteRecord>) -> Result<()> {
        match backend {
            Backend::Memory(stored) => {
                *stored = records;
                Ok(())
            }
            Backend::File => self.write_file(&records).await,
        }
    }

    async fn read_file(&self) -> Result<Vec<RouteRecord>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(Error::StorageRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if data.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&data).map_err(|source| Error::StorageCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_file(&self, records: &[RouteRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| Error::DirectoryCreate {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let data = if self.pretty {
            serde_json::to_vec_pretty(records)?
        } else {
            serde_json::to_vec(records)?
        };

        let temp_path = self.path.with_extension("json.tmp");
        let write_err = |source: std::io::Error| Error::StorageWrite {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&temp_path, data).await.map_err(write_err)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

/// Pick a millisecond-timestamp id strictly greater than any numeric id in use.
fn next_id(records: &[RouteRecord], now: DateTime<Utc>) -> String {
    let candidate = now.timestamp_millis();
    let newest = records.iter().filter_map(|r| r.id.parse::<i64>().ok()).max();
    match newest {
        Some(max) if candidate <= max => (max + 1).to_string(),
        _ => candidate.to_string(),
    }
}
