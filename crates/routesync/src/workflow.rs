//! Caller-level orchestration of the record components.
//!
//! [`RecordManager`] is what a presentation layer holds: one shared store,
//! name cache and view, with the upload, association and lifecycle
//! components wired over them. The retry-after-assign flow lives here rather
//! than inside any single component.

use std::sync::Arc;

use tracing::{info, warn};

use crate::associate::{AssociationResolver, CandidateLoad};
use crate::catalog::{AssociationCatalog, RouteCandidate};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{ConfirmationPort, DeleteOutcome, RecordLifecycle};
use crate::names::NameResolutionCache;
use crate::reconcile::{Reconciliation, ReconciliationEngine};
use crate::record::{NewRecord, RecordFilter, RouteRecord};
use crate::remote::RemoteRecordGateway;
use crate::storage::LocalRecordStore;
use crate::upload::{UploadCoordinator, UploadOutcome};

/// Entry point for reading and changing route records.
#[derive(Debug)]
pub struct RecordManager {
    engine: Arc<ReconciliationEngine>,
    uploader: UploadCoordinator,
    resolver: AssociationResolver,
    lifecycle: RecordLifecycle,
    default_filter: RecordFilter,
}

impl RecordManager {
    /// Wire the components over a store and remote collaborators, with
    /// default timeouts.
    #[must_use]
    pub fn new(
        store: Arc<LocalRecordStore>,
        gateway: Arc<dyn RemoteRecordGateway>,
        catalog: Arc<dyn AssociationCatalog>,
    ) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(
            store,
            gateway,
            Arc::new(NameResolutionCache::new()),
        ));
        Self {
            uploader: UploadCoordinator::new(engine.clone()),
            resolver: AssociationResolver::new(engine.clone(), catalog),
            lifecycle: RecordLifecycle::new(engine.clone()),
            engine,
            default_filter: RecordFilter::default(),
        }
    }

    /// Wire the components as configured.
    ///
    /// The store is opened at [`Config::records_path`]; nothing is read until
    /// the first operation.
    #[must_use]
    pub fn from_config(
        config: &Config,
        gateway: Arc<dyn RemoteRecordGateway>,
        catalog: Arc<dyn AssociationCatalog>,
    ) -> Self {
        let store = Arc::new(
            LocalRecordStore::open(config.records_path()).with_pretty(config.storage.pretty),
        );
        let engine = Arc::new(
            ReconciliationEngine::new(store, gateway, Arc::new(NameResolutionCache::new()))
                .with_list_timeout(config.list_timeout()),
        );
        let timeout = config.request_timeout();
        Self {
            uploader: UploadCoordinator::new(engine.clone()).with_request_timeout(timeout),
            resolver: AssociationResolver::new(engine.clone(), catalog).with_timeout(timeout),
            lifecycle: RecordLifecycle::new(engine.clone()).with_request_timeout(timeout),
            engine,
            default_filter: config.view.default_filter,
        }
    }

    /// The reconciliation engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// The local store.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalRecordStore> {
        self.engine.store()
    }

    /// The filter used when the caller has no preference.
    #[must_use]
    pub fn default_filter(&self) -> RecordFilter {
        self.default_filter
    }

    /// Reconcile local and remote records.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub async fn load(&self, filter: RecordFilter) -> Result<Reconciliation> {
        self.engine.reconcile(filter).await
    }

    /// The last reconciled view.
    #[must_use]
    pub fn cached(&self, filter: RecordFilter) -> Reconciliation {
        self.engine.cached(filter)
    }

    /// Look up a local record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub async fn local_record(&self, id: &str) -> Result<Option<RouteRecord>> {
        self.store().get(id).await
    }

    /// Save a new capture and refresh the view.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be saved.
    pub async fn capture(&self, new: NewRecord) -> Result<RouteRecord> {
        let record = self.store().append(new).await?;
        if let Err(e) = self.engine.reconcile(RecordFilter::All).await {
            warn!("Refresh after capture failed: {}", e);
        }
        Ok(record)
    }

    /// Upload a record.
    ///
    /// # Errors
    ///
    /// See [`UploadCoordinator::upload`].
    pub async fn upload(&self, record: &RouteRecord) -> Result<UploadOutcome> {
        self.uploader.upload(record).await
    }

    /// Load route candidates for a record's crag.
    ///
    /// # Errors
    ///
    /// See [`AssociationResolver::load_candidates`].
    pub async fn load_candidates(&self, record: &RouteRecord) -> Result<CandidateLoad> {
        self.resolver.load_candidates(record).await
    }

    /// Assign a route to a record.
    ///
    /// # Errors
    ///
    /// See [`AssociationResolver::assign`].
    pub async fn assign(
        &self,
        record: &RouteRecord,
        candidate: &RouteCandidate,
    ) -> Result<RouteRecord> {
        self.resolver.assign(record, candidate).await
    }

    /// Assign a route and immediately retry the upload.
    ///
    /// This is the recovery path after an upload failed with
    /// [`Error::MissingRouteAssignment`](crate::Error::MissingRouteAssignment):
    /// picking the candidate is the only action the user takes.
    ///
    /// # Errors
    ///
    /// Returns the assignment error, or the upload error with the assignment
    /// already persisted.
    pub async fn assign_and_upload(
        &self,
        record: &RouteRecord,
        candidate: &RouteCandidate,
    ) -> Result<UploadOutcome> {
        let assigned = self.resolver.assign(record, candidate).await?;
        info!("Retrying upload of record {} after assignment", assigned.id);
        self.uploader.upload(&assigned).await
    }

    /// Delete a record after confirmation.
    ///
    /// # Errors
    ///
    /// See [`RecordLifecycle::delete`].
    pub async fn delete(
        &self,
        record: &RouteRecord,
        confirm: &dyn ConfirmationPort,
    ) -> Result<DeleteOutcome> {
        self.lifecycle.delete(record, confirm).await
    }

    /// Rename a record.
    ///
    /// # Errors
    ///
    /// See [`RecordLifecycle::rename`].
    pub async fn rename(&self, record: &RouteRecord, name: &str) -> Result<RouteRecord> {
        self.lifecycle.rename(record, name).await
    }
}
