//! Uploading local records to the remote service.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::error::{Error, Result};
use crate::names::NameResolutionCache;
use crate::reconcile::{Reconciliation, ReconciliationEngine};
use crate::record::{RecordFilter, RecordSource, RouteRecord};
use crate::remote::RemoteRecordGateway;
use crate::storage::{LocalRecordStore, RecordPatch};

/// Default bound on a single create or delete call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The record as stored after the upload was recorded.
    pub record: RouteRecord,
    /// The refreshed view, unless the refresh itself failed.
    pub view: Option<Reconciliation>,
}

impl UploadOutcome {
    /// The server's id for the uploaded record.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.record.remote_id()
    }
}

/// Validates and uploads records, at most once at a time per record.
#[derive(Debug)]
pub struct UploadCoordinator {
    store: Arc<LocalRecordStore>,
    gateway: Arc<dyn RemoteRecordGateway>,
    names: Arc<NameResolutionCache>,
    engine: Arc<ReconciliationEngine>,
    request_timeout: Duration,
    in_flight: Mutex<HashSet<String>>,
}

impl UploadCoordinator {
    /// Create a coordinator sharing the engine's store, gateway and names.
    #[must_use]
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self {
            store: engine.store().clone(),
            gateway: engine.gateway().clone(),
            names: engine.names().clone(),
            engine,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Bound each create call by `timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether an upload of the record is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, record_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(record_id)
    }

    /// Check that a record may be uploaded, without contacting anything.
    ///
    /// # Errors
    ///
    /// Returns the first failing precondition: [`Error::MissingModelId`],
    /// [`Error::MissingRouteAssignment`], [`Error::InvalidRouteAssignment`],
    /// then [`Error::ReadOnlyRecord`] or [`Error::AlreadyUploaded`].
    pub fn validate(&self, record: &RouteRecord) -> Result<()> {
        let record_id = || record.id.clone();

        if record.model_id().is_none() {
            return Err(Error::MissingModelId {
                record_id: record_id(),
            });
        }
        let Some(route_id) = record.route_id() else {
            return Err(Error::MissingRouteAssignment {
                record_id: record_id(),
            });
        };
        if !self.names.is_known_route(route_id) {
            return Err(Error::InvalidRouteAssignment {
                record_id: record_id(),
                route_id: route_id.to_string(),
            });
        }
        if record.source == RecordSource::Server {
            return Err(Error::ReadOnlyRecord {
                record_id: record_id(),
                reason: "server records are already stored remotely",
            });
        }
        if record.uploaded {
            return Err(Error::AlreadyUploaded {
                record_id: record_id(),
            });
        }
        Ok(())
    }

    /// Upload a local record and mark it uploaded.
    ///
    /// `record` only names the record to upload: once the in-flight slot is
    /// held, the stored copy is re-read and validated again, and that copy is
    /// what gets submitted. On success the stored record carries the server's
    /// id and the view is refreshed. On any failure the stored record is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns a validation error from [`Self::validate`],
    /// [`Error::AlreadyInProgress`] if an upload of the same record is
    /// outstanding, [`Error::NotFound`] if the record is no longer stored,
    /// [`Error::Remote`] or [`Error::Timeout`] if the create call fails,
    /// [`Error::MalformedServerResponse`] if the service returns no id, or a
    /// storage error if the upload cannot be recorded locally.
    #[instrument(skip_all, fields(record_id = %record.id))]
    pub async fn upload(&self, record: &RouteRecord) -> Result<UploadOutcome> {
        self.validate(record)?;
        let _guard = self.begin(&record.id)?;

        let record = &self.stored_copy(&record.id).await?;
        self.validate(record)?;

        // Both present, checked by validate.
        let (Some(model_id), Some(route_id)) = (record.model_id(), record.route_id()) else {
            return Err(Error::internal("validated record lost its references"));
        };

        debug!("Uploading record {} (route {})", record.id, route_id);
        let response = tokio::time::timeout(
            self.request_timeout,
            self.gateway.create(model_id, route_id, &record.payload),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: format!("upload of record {}", record.id),
        })?
        .map_err(|e| {
            warn!("Upload of record {} failed: {}", record.id, e);
            Error::remote("create", Some(record.id.as_str()), e)
        })?;

        let Some(remote_id) = response.remote_record_id.filter(|id| !id.trim().is_empty()) else {
            warn!("Upload of record {} succeeded but no id was returned", record.id);
            return Err(Error::MalformedServerResponse {
                record_id: record.id.clone(),
            });
        };

        let stored = self
            .store
            .update(&record.id, &RecordPatch::mark_uploaded(&remote_id))
            .await
            .map_err(|e| {
                error!(
                    "Record {} was uploaded as {} but could not be marked locally: {}",
                    record.id, remote_id, e
                );
                e
            })?;
        info!("Uploaded record {} as {}", stored.id, remote_id);
        self.engine.replace_cached(&stored);

        let view = match self.engine.reconcile(RecordFilter::All).await {
            Ok(view) => Some(view),
            Err(e) => {
                warn!("Refresh after upload failed: {}", e);
                None
            }
        };

        Ok(UploadOutcome {
            record: stored,
            view,
        })
    }

    async fn stored_copy(&self, record_id: &str) -> Result<RouteRecord> {
        self.store
            .get(record_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                id: record_id.to_string(),
            })
    }

    fn begin(&self, record_id: &str) -> Result<InFlight<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(record_id.to_string()) {
            return Err(Error::AlreadyInProgress {
                record_id: record_id.to_string(),
            });
        }
        Ok(InFlight {
            set: &self.in_flight,
            record_id: record_id.to_string(),
        })
    }
}

/// Membership in the in-flight set, released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    record_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.record_id);
    }
}
