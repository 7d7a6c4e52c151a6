//! Scripted collaborators and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::catalog::{AssociationCatalog, RouteCandidate};
use crate::remote::{
    CreateResponse, GatewayError, GatewayResult, RemoteModel, RemoteRecord, RemoteRecordGateway,
    RemoteRoute,
};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A records file path no other test uses.
pub fn temp_path(name: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "routesync_test_{}_{name}_{n}.json",
        std::process::id()
    ))
}

/// A typical capture payload.
pub fn payload() -> Value {
    json!({"route_name": "#1700000000000", "points": [[0.5, 1.25, -2.0]]})
}

/// A remote listing entry with named model and route.
pub fn remote_record(
    remote_id: &str,
    route: Option<(&str, &str)>,
    created_at: Option<DateTime<Utc>>,
) -> RemoteRecord {
    RemoteRecord {
        remote_record_id: remote_id.to_string(),
        model: Some(RemoteModel {
            id: "m1".to_string(),
            name: Some("North Face".to_string()),
            crag_id: Some("c1".to_string()),
        }),
        route: route.map(|(id, name)| RemoteRoute {
            id: id.to_string(),
            name: Some(name.to_string()),
        }),
        payload: payload(),
        created_at,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Programmable in-memory remote service.
///
/// Successful creates are added to the listing and successful deletes remove
/// from it, so reconciliation after a mutation sees the new remote state.
#[derive(Debug)]
pub struct FakeGateway {
    listing: Mutex<GatewayResult<Vec<RemoteRecord>>>,
    create_response: Mutex<GatewayResult<CreateResponse>>,
    delete_response: Mutex<GatewayResult<()>>,
    create_gate: Mutex<Option<Arc<Notify>>>,
    creates: Mutex<Vec<(String, String)>>,
    payloads: Mutex<Vec<Value>>,
    deletes: Mutex<Vec<String>>,
    lists: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            listing: Mutex::new(Ok(Vec::new())),
            create_response: Mutex::new(Ok(CreateResponse::with_id("srv-1"))),
            delete_response: Mutex::new(Ok(())),
            create_gate: Mutex::new(None),
            creates: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            lists: AtomicUsize::new(0),
        }
    }

    pub fn with_records(records: Vec<RemoteRecord>) -> Self {
        let gateway = Self::new();
        *lock(&gateway.listing) = Ok(records);
        gateway
    }

    pub fn set_listing(&self, listing: GatewayResult<Vec<RemoteRecord>>) {
        *lock(&self.listing) = listing;
    }

    pub fn set_create(&self, response: GatewayResult<CreateResponse>) {
        *lock(&self.create_response) = response;
    }

    pub fn set_delete(&self, response: GatewayResult<()>) {
        *lock(&self.delete_response) = response;
    }

    /// Make every create wait until the returned notify is signalled.
    pub fn hold_creates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.create_gate) = Some(gate.clone());
        gate
    }

    /// `(model_id, route_id)` of every create call.
    pub fn creates(&self) -> Vec<(String, String)> {
        lock(&self.creates).clone()
    }

    /// Payload of every create call.
    pub fn created_payloads(&self) -> Vec<Value> {
        lock(&self.payloads).clone()
    }

    /// Remote ids of every delete call.
    pub fn deletes(&self) -> Vec<String> {
        lock(&self.deletes).clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteRecordGateway for FakeGateway {
    async fn create(
        &self,
        model_id: &str,
        route_id: &str,
        payload: &Value,
    ) -> GatewayResult<CreateResponse> {
        lock(&self.creates).push((model_id.to_string(), route_id.to_string()));
        lock(&self.payloads).push(payload.clone());
        let gate = lock(&self.create_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let response = lock(&self.create_response).clone();
        if let Ok(CreateResponse {
            remote_record_id: Some(id),
        }) = &response
        {
            if let Ok(listing) = &mut *lock(&self.listing) {
                listing.push(RemoteRecord {
                    remote_record_id: id.clone(),
                    model: Some(RemoteModel {
                        id: model_id.to_string(),
                        name: None,
                        crag_id: None,
                    }),
                    route: Some(RemoteRoute {
                        id: route_id.to_string(),
                        name: None,
                    }),
                    payload: payload.clone(),
                    created_at: Some(Utc::now()),
                });
            }
        }
        response
    }

    async fn delete(&self, remote_record_id: &str) -> GatewayResult<()> {
        lock(&self.deletes).push(remote_record_id.to_string());
        let response = lock(&self.delete_response).clone();
        if response.is_ok() {
            if let Ok(listing) = &mut *lock(&self.listing) {
                listing.retain(|r| r.remote_record_id != remote_record_id);
            }
        }
        response
    }

    async fn list_for_current_user(&self) -> GatewayResult<Vec<RemoteRecord>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        lock(&self.listing).clone()
    }
}

/// Programmable route catalog.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    routes: Mutex<HashMap<String, GatewayResult<Vec<RouteCandidate>>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(crag_id: &str, routes: Vec<RouteCandidate>) -> Self {
        let catalog = Self::new();
        catalog.set_routes(crag_id, Ok(routes));
        catalog
    }

    pub fn set_routes(&self, crag_id: &str, routes: GatewayResult<Vec<RouteCandidate>>) {
        lock(&self.routes).insert(crag_id.to_string(), routes);
    }

    /// Make loads for `crag_id` wait until the returned notify is signalled.
    pub fn hold(&self, crag_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).insert(crag_id.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AssociationCatalog for FakeCatalog {
    async fn list_route_candidates(&self, crag_id: &str) -> GatewayResult<Vec<RouteCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.gates).get(crag_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.routes)
            .get(crag_id)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::rejected("no routes for crag")))
    }
}
