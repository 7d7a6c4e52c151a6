//! Reconciliation of local and remote records.
//!
//! The engine merges the local store with the remote listing into one
//! de-duplicated, newest-first view. A local record that has been confirmed
//! uploaded represents its server copy, so the server copy is dropped from
//! the view. A failed remote listing degrades to the local-only view; a failed
//! local read fails the whole call.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::names::{NameResolutionCache, UNKNOWN_NAME};
use crate::record::{RecordFilter, RecordSource, RouteRecord};
use crate::remote::{RemoteRecord, RemoteRecordGateway};
use crate::storage::LocalRecordStore;

/// Default bound on the remote listing.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// A record together with its resolved names.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRecord {
    /// The reconciled record.
    pub record: RouteRecord,
    /// Label to show for the record.
    pub display_name: String,
    /// Name of the record's model, or `"Unknown"`.
    pub model_name: String,
    /// Name of the record's route, or `"Unknown"`.
    pub route_name: String,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// The filter that was applied.
    pub filter: RecordFilter,
    /// Records, newest first.
    pub records: Vec<DisplayRecord>,
    /// Why the remote portion is missing, if it is.
    pub remote_error: Option<String>,
}

impl Reconciliation {
    /// Whether the remote listing failed and only local records are shown.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.remote_error.is_some()
    }

    /// Number of records in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find a record by id and source.
    ///
    /// Local ids and server ids are separate namespaces.
    #[must_use]
    pub fn get(&self, id: &str, source: RecordSource) -> Option<&DisplayRecord> {
        self.records
            .iter()
            .find(|r| r.record.id == id && r.record.source == source)
    }
}

/// Merges the local store with the remote listing.
#[derive(Debug)]
pub struct ReconciliationEngine {
    store: Arc<LocalRecordStore>,
    gateway: Arc<dyn RemoteRecordGateway>,
    names: Arc<NameResolutionCache>,
    list_timeout: Duration,
    /// Last successful merge, unfiltered.
    view: RwLock<Vec<RouteRecord>>,
}

impl ReconciliationEngine {
    /// Create an engine over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<LocalRecordStore>,
        gateway: Arc<dyn RemoteRecordGateway>,
        names: Arc<NameResolutionCache>,
    ) -> Self {
        Self {
            store,
            gateway,
            names,
            list_timeout: DEFAULT_LIST_TIMEOUT,
            view: RwLock::new(Vec::new()),
        }
    }

    /// Bound the remote listing by `timeout`.
    #[must_use]
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// The local store.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalRecordStore> {
        &self.store
    }

    /// The remote gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn RemoteRecordGateway> {
        &self.gateway
    }

    /// The name cache.
    #[must_use]
    pub fn names(&self) -> &Arc<NameResolutionCache> {
        &self.names
    }

    /// Fetch local and remote records concurrently and merge them.
    ///
    /// Names found in the remote listing are added to the name cache. The
    /// merged view is kept as the cached view.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local store cannot be read; remote
    /// failures are reported through [`Reconciliation::remote_error`].
    pub async fn reconcile(&self, filter: RecordFilter) -> Result<Reconciliation> {
        let (local, remote) = tokio::join!(self.store.list(), self.fetch_remote());
        let local = local?;

        let (remote, remote_error) = match remote {
            Ok(remote) => (remote, None),
            Err(e) => {
                warn!("Remote listing failed, showing local records only: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        self.names.ingest(&remote);
        let merged = merge_records(local, remote, Utc::now());
        debug!("Reconciled {} records", merged.len());

        let records = self.present(&merged, filter);
        *self.view.write().unwrap_or_else(std::sync::PoisonError::into_inner) = merged;

        Ok(Reconciliation {
            filter,
            records,
            remote_error,
        })
    }

    /// The last successful merge, filtered, without touching any collaborator.
    #[must_use]
    pub fn cached(&self, filter: RecordFilter) -> Reconciliation {
        let view = self
            .view
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Reconciliation {
            filter,
            records: self.present(&view, filter),
            remote_error: None,
        }
    }

    /// Replace a record in the cached view after a successful local write.
    ///
    /// Returns `false` if the record is not in the cached view.
    pub fn replace_cached(&self, record: &RouteRecord) -> bool {
        let mut view = self
            .view
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match view
            .iter_mut()
            .find(|r| r.id == record.id && r.source == record.source)
        {
            Some(slot) => {
                *slot = record.clone();
                true
            }
            None => false,
        }
    }

    /// Attach resolved names to the records passing `filter`.
    #[must_use]
    pub fn present(&self, records: &[RouteRecord], filter: RecordFilter) -> Vec<DisplayRecord> {
        records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|record| DisplayRecord {
                display_name: record.display_name(),
                model_name: record
                    .model_id()
                    .map_or_else(|| UNKNOWN_NAME.to_string(), |id| self.names.resolve_model_name(id)),
                route_name: record
                    .route_id()
                    .map_or_else(|| UNKNOWN_NAME.to_string(), |id| self.names.resolve_route_name(id)),
                record: record.clone(),
            })
            .collect()
    }

    async fn fetch_remote(&self) -> Result<Vec<RemoteRecord>> {
        match tokio::time::timeout(self.list_timeout, self.gateway.list_for_current_user()).await
        {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(e)) => Err(Error::remote("list", None, e)),
            Err(_) => Err(Error::Timeout {
                operation: "remote list".to_string(),
            }),
        }
    }
}

/// Merge local records with a remote listing.
///
/// Remote records already represented by an uploaded local record are dropped,
/// the rest become `source == server` records. The result is sorted newest
/// first and never holds two records with the same remote id; when local
/// data itself is inconsistent the first stored record wins.
#[must_use]
pub fn merge_records(
    local: Vec<RouteRecord>,
    remote: Vec<RemoteRecord>,
    now: DateTime<Utc>,
) -> Vec<RouteRecord> {
    let represented: HashSet<String> = local
        .iter()
        .filter(|r| r.uploaded)
        .filter_map(|r| r.remote_id().map(str::to_string))
        .collect();

    let mut merged = local;
    merged.extend(
        remote
            .into_iter()
            .filter(|r| !represented.contains(&r.remote_record_id))
            .map(|r| r.into_record(now)),
    );

    let mut seen = HashSet::new();
    merged.retain(|record| match record.remote_id() {
        Some(id) if !seen.insert(id.to_string()) => {
            warn!(
                "Dropping record {} ({}): remote id {} already shown",
                record.id, record.source, id
            );
            false
        }
        _ => true,
    });

    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}
