//! Deleting and renaming records.
//!
//! Deletion depends on where the record lives:
//!
//! | State           | Action                                                        |
//! |-----------------|---------------------------------------------------------------|
//! | `LocalOnly`     | Remove from the local store.                                  |
//! | `LocalUploaded` | Delete remotely, then locally. If the remote delete fails the |
//! |                 | user may still choose to delete the local copy.               |
//! | `ServerOnly`    | Delete remotely. Failure fails the operation.                 |
//!
//! Every delete is confirmed first through a [`ConfirmationPort`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::reconcile::ReconciliationEngine;
use crate::record::{RecordFilter, RecordSource, RecordState, RouteRecord};
use crate::remote::RemoteRecordGateway;
use crate::storage::{LocalRecordStore, RecordPatch};
use crate::upload::DEFAULT_REQUEST_TIMEOUT;

/// A question put to the user before a destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationRequest {
    /// Confirm deleting a record.
    Delete {
        /// Id of the record.
        record_id: String,
        /// Label of the record.
        display_name: String,
        /// Where the record lives.
        state: RecordState,
    },
    /// The remote delete failed; confirm deleting the local copy anyway.
    DeleteLocallyAfterRemoteFailure {
        /// Id of the record.
        record_id: String,
        /// Why the remote delete failed.
        message: String,
    },
}

/// The user's answer to a [`ConfirmationRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead.
    Confirm,
    /// Stop.
    Decline,
}

/// Asks the user to confirm destructive actions.
pub trait ConfirmationPort: Send + Sync {
    /// Answer one request.
    fn confirm(&self, request: &ConfirmationRequest) -> Decision;
}

impl<F> ConfirmationPort for F
where
    F: Fn(&ConfirmationRequest) -> Decision + Send + Sync,
{
    fn confirm(&self, request: &ConfirmationRequest) -> Decision {
        self(request)
    }
}

/// What a delete did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record is gone everywhere it existed.
    Deleted {
        /// A local copy was removed.
        local: bool,
        /// A remote copy was removed.
        remote: bool,
    },
    /// The remote delete failed and the user chose to delete the local copy.
    /// The remote copy remains.
    DeletedLocallyOnly {
        /// Why the remote delete failed.
        remote_error: String,
    },
    /// The remote delete failed and the user kept the local copy.
    KeptAfterRemoteFailure {
        /// Why the remote delete failed.
        remote_error: String,
    },
    /// The user declined the delete.
    Cancelled,
}

/// Delete and rename operations on records.
#[derive(Debug)]
pub struct RecordLifecycle {
    store: Arc<LocalRecordStore>,
    gateway: Arc<dyn RemoteRecordGateway>,
    engine: Arc<ReconciliationEngine>,
    request_timeout: Duration,
}

impl RecordLifecycle {
    /// Create a lifecycle over the engine's store and gateway.
    #[must_use]
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self {
            store: engine.store().clone(),
            gateway: engine.gateway().clone(),
            engine,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each remote delete by `timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Delete a record after confirming with the user.
    ///
    /// Local records are classified by their stored copy, not by `record`, so
    /// a record uploaded since the caller's snapshot still loses its remote
    /// copy. The view is refreshed after anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a local record is not in the store, a
    /// remote error if deleting a server record fails, or a storage error if
    /// the local removal fails.
    #[instrument(skip_all, fields(record_id = %record.id))]
    pub async fn delete(
        &self,
        record: &RouteRecord,
        confirm: &dyn ConfirmationPort,
    ) -> Result<DeleteOutcome> {
        let current;
        let record = if record.source == RecordSource::Local {
            current = self
                .store
                .get(&record.id)
                .await?
                .ok_or_else(|| Error::NotFound {
                    id: record.id.clone(),
                })?;
            &current
        } else {
            record
        };

        let state = record.state();
        let request = ConfirmationRequest::Delete {
            record_id: record.id.clone(),
            display_name: record.display_name(),
            state,
        };
        if confirm.confirm(&request) == Decision::Decline {
            debug!("Delete of record {} cancelled", record.id);
            return Ok(DeleteOutcome::Cancelled);
        }

        let outcome = match state {
            RecordState::LocalOnly => {
                if !self.store.remove(&record.id).await? {
                    return Err(Error::NotFound {
                        id: record.id.clone(),
                    });
                }
                DeleteOutcome::Deleted {
                    local: true,
                    remote: false,
                }
            }
            RecordState::LocalUploaded => self.delete_uploaded(record, confirm).await?,
            RecordState::ServerOnly => {
                self.delete_remote(record).await?;
                DeleteOutcome::Deleted {
                    local: false,
                    remote: true,
                }
            }
        };

        if !matches!(outcome, DeleteOutcome::KeptAfterRemoteFailure { .. }) {
            info!("Deleted record {} ({:?})", record.id, outcome);
            self.refresh().await;
        }
        Ok(outcome)
    }

    /// Change a record's display label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnlyRecord`] for server or uploaded records,
    /// [`Error::EmptyName`] if the trimmed name is empty, or a storage error if
    /// the write fails.
    #[instrument(skip_all, fields(record_id = %record.id))]
    pub async fn rename(&self, record: &RouteRecord, name: &str) -> Result<RouteRecord> {
        ensure_renamable(record)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName {
                record_id: record.id.clone(),
            });
        }

        let stored = self
            .store
            .update_checked(&record.id, ensure_renamable, &RecordPatch::rename(name))
            .await?;
        self.engine.replace_cached(&stored);
        info!("Renamed record {} to {:?}", stored.id, name);
        Ok(stored)
    }

    async fn delete_uploaded(
        &self,
        record: &RouteRecord,
        confirm: &dyn ConfirmationPort,
    ) -> Result<DeleteOutcome> {
        match self.delete_remote(record).await {
            Ok(()) => {
                let local = self.store.remove(&record.id).await?;
                if !local {
                    warn!("Record {} was already gone from the local store", record.id);
                }
                Ok(DeleteOutcome::Deleted {
                    local,
                    remote: true,
                })
            }
            Err(e) => {
                let remote_error = e.to_string();
                let request = ConfirmationRequest::DeleteLocallyAfterRemoteFailure {
                    record_id: record.id.clone(),
                    message: remote_error.clone(),
                };
                if confirm.confirm(&request) == Decision::Decline {
                    return Ok(DeleteOutcome::KeptAfterRemoteFailure { remote_error });
                }
                self.store.remove(&record.id).await?;
                warn!(
                    "Deleted record {} locally; its remote copy remains",
                    record.id
                );
                Ok(DeleteOutcome::DeletedLocallyOnly { remote_error })
            }
        }
    }

    async fn delete_remote(&self, record: &RouteRecord) -> Result<()> {
        let Some(remote_id) = record.remote_id() else {
            return Err(Error::internal(format!(
                "record {} has no remote id",
                record.id
            )));
        };
        tokio::time::timeout(self.request_timeout, self.gateway.delete(remote_id))
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("delete of record {}", record.id),
            })?
            .map_err(|e| {
                warn!("Remote delete of record {} failed: {}", record.id, e);
                Error::remote("delete", Some(record.id.as_str()), e)
            })
    }

    async fn refresh(&self) {
        if let Err(e) = self.engine.reconcile(RecordFilter::All).await {
            warn!("Refresh after delete failed: {}", e);
        }
    }
}

fn ensure_renamable(record: &RouteRecord) -> Result<()> {
    if record.source == RecordSource::Server {
        return Err(Error::ReadOnlyRecord {
            record_id: record.id.clone(),
            reason: "server records cannot be renamed",
        });
    }
    if record.uploaded {
        return Err(Error::ReadOnlyRecord {
            record_id: record.id.clone(),
            reason: "uploaded records cannot be renamed",
        });
    }
    Ok(())
}
