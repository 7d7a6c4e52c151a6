//! `routesync` - Local-first reconciliation of route annotation records
//!
//! Route annotation records are captured offline, stored on the device, and
//! later uploaded to a remote service. This library keeps the local store and
//! the remote listing in one de-duplicated view, validates and uploads records,
//! binds them to routes from a crag's catalog, and deletes them according to
//! where they live.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod associate;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod names;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod storage;
pub mod upload;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use associate::{AssociationResolver, CandidateLoad};
pub use catalog::{AssociationCatalog, RouteCandidate};
pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{ConfirmationPort, ConfirmationRequest, Decision, DeleteOutcome, RecordLifecycle};
pub use logging::init_logging;
pub use names::{NameResolutionCache, UNKNOWN_NAME};
pub use reconcile::{DisplayRecord, Reconciliation, ReconciliationEngine};
pub use record::{NewRecord, RecordFilter, RecordSource, RecordState, RouteRecord};
pub use remote::{GatewayError, OfflineGateway, RemoteRecord, RemoteRecordGateway};
pub use storage::{LocalRecordStore, RecordPatch};
pub use upload::{UploadCoordinator, UploadOutcome};
pub use workflow::RecordManager;
