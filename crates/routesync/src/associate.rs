//! Binding records to routes chosen from the crag's catalog.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::catalog::{AssociationCatalog, RouteCandidate};
use crate::error::{Error, Result};
use crate::names::NameResolutionCache;
use crate::reconcile::ReconciliationEngine;
use crate::record::{RecordSource, RouteRecord};
use crate::storage::{LocalRecordStore, RecordPatch};
use crate::upload::DEFAULT_REQUEST_TIMEOUT;

/// Outcome of a candidate load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateLoad {
    /// The candidates of the most recent load.
    Current(Vec<RouteCandidate>),
    /// A newer load started while this one was outstanding; its result was
    /// discarded.
    Superseded,
}

impl CandidateLoad {
    /// The candidates, unless the load was superseded.
    #[must_use]
    pub fn into_current(self) -> Option<Vec<RouteCandidate>> {
        match self {
            Self::Current(candidates) => Some(candidates),
            Self::Superseded => None,
        }
    }
}

/// Loads route candidates and persists the user's choice.
#[derive(Debug)]
pub struct AssociationResolver {
    store: Arc<LocalRecordStore>,
    catalog: Arc<dyn AssociationCatalog>,
    names: Arc<NameResolutionCache>,
    engine: Arc<ReconciliationEngine>,
    timeout: Duration,
    latest_load: AtomicU64,
}

impl AssociationResolver {
    /// Create a resolver writing through the engine's store.
    #[must_use]
    pub fn new(engine: Arc<ReconciliationEngine>, catalog: Arc<dyn AssociationCatalog>) -> Self {
        Self {
            store: engine.store().clone(),
            names: engine.names().clone(),
            engine,
            catalog,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            latest_load: AtomicU64::new(0),
        }
    }

    /// Bound each catalog call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load the routes of the record's crag.
    ///
    /// Only the most recently started load returns its candidates; a load that
    /// completes after a newer one was started returns
    /// [`CandidateLoad::Superseded`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCragContext`] if the record has no crag id, or
    /// a remote error if the catalog call fails or times out.
    pub async fn load_candidates(&self, record: &RouteRecord) -> Result<CandidateLoad> {
        let Some(crag_id) = record.crag_id() else {
            return Err(Error::MissingCragContext {
                record_id: record.id.clone(),
            });
        };

        let token = self.latest_load.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Loading route candidates for crag {} (load {})", crag_id, token);

        let result = tokio::time::timeout(self.timeout, self.catalog.list_route_candidates(crag_id))
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("route candidates for crag {crag_id}"),
            })
            .and_then(|r| {
                r.map_err(|e| Error::remote("list route candidates", Some(record.id.as_str()), e))
            });

        if self.latest_load.load(Ordering::SeqCst) != token {
            debug!("Discarding superseded candidate load {}", token);
            return Ok(CandidateLoad::Superseded);
        }

        let candidates = result.map_err(|e| {
            warn!("Failed to load route candidates for crag {}: {}", crag_id, e);
            e
        })?;
        debug!("Loaded {} route candidates", candidates.len());
        Ok(CandidateLoad::Current(candidates))
    }

    /// Persist `candidate` as the record's route.
    ///
    /// The candidate's name is remembered so the record passes upload
    /// validation, and the cached view is patched in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnlyRecord`] for server or uploaded records,
    /// [`Error::InvalidRouteAssignment`] for a candidate without an id, or a
    /// storage error if the write fails. A failed write changes nothing.
    #[instrument(skip_all, fields(record_id = %record.id, route_id = %candidate.id))]
    pub async fn assign(
        &self,
        record: &RouteRecord,
        candidate: &RouteCandidate,
    ) -> Result<RouteRecord> {
        ensure_assignable(record)?;
        if candidate.id.trim().is_empty() {
            return Err(Error::InvalidRouteAssignment {
                record_id: record.id.clone(),
                route_id: candidate.id.clone(),
            });
        }

        let stored = self
            .store
            .update_checked(
                &record.id,
                ensure_assignable,
                &RecordPatch::assign_route(&candidate.id),
            )
            .await?;

        if !candidate.name.trim().is_empty() {
            self.names.insert_route_name(&candidate.id, &candidate.name);
        }
        self.engine.replace_cached(&stored);
        info!(
            "Assigned record {} to route {} ({})",
            stored.id, candidate.id, candidate.name
        );
        Ok(stored)
    }
}

fn ensure_assignable(record: &RouteRecord) -> Result<()> {
    if record.source == RecordSource::Server {
        return Err(Error::ReadOnlyRecord {
            record_id: record.id.clone(),
            reason: "server records cannot be reassigned",
        });
    }
    if record.uploaded {
        return Err(Error::ReadOnlyRecord {
            record_id: record.id.clone(),
            reason: "uploaded records cannot be reassigned",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NewRecord, RecordFilter};
    use crate::remote::GatewayError;
    use crate::test_support::{payload, FakeCatalog, FakeGateway};

    struct Harness {
        catalog: Arc<FakeCatalog>,
        engine: Arc<ReconciliationEngine>,
        resolver: Arc<AssociationResolver>,
    }

    fn harness(catalog: FakeCatalog) -> Harness {
        let catalog = Arc::new(catalog);
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(LocalRecordStore::open_in_memory()),
            Arc::new(FakeGateway::new()),
            Arc::new(NameResolutionCache::new()),
        ));
        Harness {
            resolver: Arc::new(AssociationResolver::new(engine.clone(), catalog.clone())),
            catalog,
            engine,
        }
    }

    async fn capture(h: &Harness, crag: Option<&str>) -> RouteRecord {
        let mut new = NewRecord::new("m1", payload());
        if let Some(crag) = crag {
            new = new.with_crag(crag);
        }
        h.engine.store().append(new).await.unwrap()
    }

    fn slab_direct() -> RouteCandidate {
        RouteCandidate::new("r9", "Slab Direct").with_grade("6a")
    }

    #[tokio::test]
    async fn test_load_candidates() {
        let h = harness(FakeCatalog::with_routes(
            "c1",
            vec![slab_direct(), RouteCandidate::new("r10", "Arete")],
        ));
        let record = capture(&h, Some("c1")).await;

        let load = h.resolver.load_candidates(&record).await.unwrap();

        let candidates = load.into_current().unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].grade.as_deref(), Some("6a"));
    }

    #[tokio::test]
    async fn test_missing_crag_context() {
        let h = harness(FakeCatalog::new());
        let record = capture(&h, None).await;

        let err = h.resolver.load_candidates(&record).await.unwrap_err();

        assert!(matches!(err, Error::MissingCragContext { .. }));
        assert_eq!(h.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn test_catalog_failure() {
        let h = harness(FakeCatalog::new());
        h.catalog
            .set_routes("c1", Err(GatewayError::transport("no response")));
        let record = capture(&h, Some("c1")).await;

        let err = h.resolver.load_candidates(&record).await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.record_id(), Some(record.id.as_str()));
    }

    #[tokio::test]
    async fn test_stale_load_is_superseded() {
        let catalog = FakeCatalog::with_routes("c1", vec![RouteCandidate::new("r1", "Old")]);
        catalog.set_routes("c2", Ok(vec![slab_direct()]));
        let h = harness(catalog);
        let gate = h.catalog.hold("c1");
        let first_record = capture(&h, Some("c1")).await;
        let second_record = capture(&h, Some("c2")).await;

        let first = {
            let resolver = h.resolver.clone();
            tokio::spawn(async move { resolver.load_candidates(&first_record).await })
        };
        while h.catalog.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let second = h.resolver.load_candidates(&second_record).await.unwrap();
        assert_eq!(second, CandidateLoad::Current(vec![slab_direct()]));

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), CandidateLoad::Superseded);
    }

    #[tokio::test]
    async fn test_assign_persists_and_learns_name() {
        let h = harness(FakeCatalog::new());
        let record = capture(&h, Some("c1")).await;
        h.engine.reconcile(RecordFilter::All).await.unwrap();

        let stored = h.resolver.assign(&record, &slab_direct()).await.unwrap();

        assert_eq!(stored.route_id(), Some("r9"));
        assert_eq!(
            h.engine.store().get(&record.id).await.unwrap().unwrap().route_id(),
            Some("r9")
        );
        assert!(h.engine.names().is_known_route("r9"));

        let cached = h.engine.cached(RecordFilter::All);
        let shown = cached.get(&record.id, RecordSource::Local).unwrap();
        assert_eq!(shown.record.route_id(), Some("r9"));
        assert_eq!(shown.route_name, "Slab Direct");
    }

    #[tokio::test]
    async fn test_assign_read_only_records() {
        let h = harness(FakeCatalog::new());
        let mut record = capture(&h, Some("c1")).await;

        record.uploaded = true;
        let err = h.resolver.assign(&record, &slab_direct()).await.unwrap_err();
        assert!(matches!(err, Error::ReadOnlyRecord { .. }));

        record.uploaded = false;
        record.source = RecordSource::Server;
        let err = h.resolver.assign(&record, &slab_direct()).await.unwrap_err();
        assert!(matches!(err, Error::ReadOnlyRecord { .. }));
    }

    #[tokio::test]
    async fn test_assign_rejects_record_uploaded_since_snapshot() {
        let h = harness(FakeCatalog::new());
        let snapshot = capture(&h, Some("c1")).await;
        h.engine
            .store()
            .update(&snapshot.id, &RecordPatch::mark_uploaded("srv-1"))
            .await
            .unwrap();

        let err = h.resolver.assign(&snapshot, &slab_direct()).await.unwrap_err();

        assert!(matches!(err, Error::ReadOnlyRecord { .. }));
        let stored = h.engine.store().get(&snapshot.id).await.unwrap().unwrap();
        assert!(stored.route_id().is_none());
        assert!(!h.engine.names().is_known_route("r9"));
    }

    #[tokio::test]
    async fn test_failed_assign_changes_nothing() {
        let h = harness(FakeCatalog::new());
        let mut record = capture(&h, Some("c1")).await;
        h.engine.reconcile(RecordFilter::All).await.unwrap();
        record.id = "missing".to_string();

        let err = h.resolver.assign(&record, &slab_direct()).await.unwrap_err();

        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!h.engine.names().is_known_route("r9"));
        assert!(h
            .engine
            .cached(RecordFilter::All)
            .records
            .iter()
            .all(|r| r.record.route_id().is_none()));
    }
}
