//! Remote record service contract.
//!
//! The transport is owned by the host application; this module only defines
//! what the reconciliation engine needs from it and the wire shapes it
//! exchanges. Responses follow the service's `{success, data}` envelope, which
//! implementations map to `Ok`/`Err`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::record::{RecordSource, RouteRecord};

/// Errors reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No signed-in user.
    #[error("user not authenticated")]
    Unauthenticated,

    /// The service answered with `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// No usable response was received.
    #[error("request failed: {0}")]
    Transport(String),

    /// The remote service is not reachable from this process at all.
    #[error("remote service unavailable")]
    Offline,
}

impl GatewayError {
    /// Create a rejection with the service's message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Create a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Result type for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Payload of a successful create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// The server's id for the new record. Absent in malformed responses.
    #[serde(default)]
    pub remote_record_id: Option<String>,
}

impl CreateResponse {
    /// A response carrying the given id.
    #[must_use]
    pub fn with_id(remote_record_id: impl Into<String>) -> Self {
        Self {
            remote_record_id: Some(remote_record_id.into()),
        }
    }
}

/// Model reference embedded in a remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteModel {
    /// Model id.
    pub id: String,
    /// Display name, if the service knows one.
    #[serde(default)]
    pub name: Option<String>,
    /// The crag the model belongs to.
    #[serde(default)]
    pub crag_id: Option<String>,
}

/// Route reference embedded in a remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRoute {
    /// Route id.
    pub id: String,
    /// Display name, if the service knows one.
    #[serde(default)]
    pub name: Option<String>,
}

/// One record as returned by the remote listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// The server's canonical id.
    pub remote_record_id: String,
    /// The model the record belongs to.
    #[serde(default)]
    pub model: Option<RemoteModel>,
    /// The route the record documents.
    #[serde(default)]
    pub route: Option<RemoteRoute>,
    /// Capture data.
    #[serde(default)]
    pub payload: Value,
    /// When the server stored the record.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    /// Map into the shared record shape with `source == server`.
    ///
    /// `fallback_time` is used as the timestamp when the service did not
    /// report a creation time.
    #[must_use]
    pub fn into_record(self, fallback_time: DateTime<Utc>) -> RouteRecord {
        let (model_id, crag_id) = match self.model {
            Some(model) => (Some(model.id), model.crag_id),
            None => (None, None),
        };
        RouteRecord {
            id: self.remote_record_id.clone(),
            timestamp: self.created_at.unwrap_or(fallback_time),
            source: RecordSource::Server,
            uploaded: true,
            remote_id: Some(self.remote_record_id),
            uploaded_at: self.created_at,
            model_id,
            crag_id,
            route_id: self.route.map(|route| route.id),
            payload: self.payload,
            custom_name: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Create, delete and list operations against the remote record service.
#[async_trait::async_trait]
pub trait RemoteRecordGateway: Send + Sync + std::fmt::Debug {
    /// Store a record remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the record or cannot be reached.
    async fn create(
        &self,
        model_id: &str,
        route_id: &str,
        payload: &Value,
    ) -> GatewayResult<CreateResponse>;

    /// Delete a remote record.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the delete or cannot be reached.
    async fn delete(&self, remote_record_id: &str) -> GatewayResult<()>;

    /// List every record belonging to the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the request or cannot be reached.
    async fn list_for_current_user(&self) -> GatewayResult<Vec<RemoteRecord>>;
}

/// A gateway for sessions with no remote service.
///
/// Every call fails with [`GatewayError::Offline`], so reconciliation degrades
/// to the local-only view.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

#[async_trait::async_trait]
impl RemoteRecordGateway for OfflineGateway {
    async fn create(&self, _: &str, _: &str, _: &Value) -> GatewayResult<CreateResponse> {
        Err(GatewayError::Offline)
    }

    async fn delete(&self, _: &str) -> GatewayResult<()> {
        Err(GatewayError::Offline)
    }

    async fn list_for_current_user(&self) -> GatewayResult<Vec<RemoteRecord>> {
        Err(GatewayError::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gateway_error_display() {
        assert_eq!(
            GatewayError::Unauthenticated.to_string(),
            "user not authenticated"
        );
        assert!(GatewayError::rejected("Upload failed")
            .to_string()
            .contains("Upload failed"));
        assert!(GatewayError::transport("no response")
            .to_string()
            .contains("no response"));
        assert!(GatewayError::Offline.to_string().contains("unavailable"));
    }

    #[test]
    fn test_remote_record_deserialize() {
        let json = r#"{
            "remoteRecordId": "srv-42",
            "model": {"id": "m1", "name": "North Face", "cragId": "c1"},
            "route": {"id": "r9", "name": "Slab Direct"},
            "payload": {"points": []}
        }"#;
        let remote: RemoteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(remote.remote_record_id, "srv-42");
        assert_eq!(remote.model.as_ref().unwrap().crag_id.as_deref(), Some("c1"));
        assert!(remote.created_at.is_none());
    }

    #[test]
    fn test_into_record() {
        let fallback = Utc::now();
        let remote = RemoteRecord {
            remote_record_id: "srv-42".to_string(),
            model: Some(RemoteModel {
                id: "m1".to_string(),
                name: None,
                crag_id: Some("c1".to_string()),
            }),
            route: Some(RemoteRoute {
                id: "r9".to_string(),
                name: None,
            }),
            payload: json!({"points": []}),
            created_at: None,
        };

        let record = remote.into_record(fallback);
        assert_eq!(record.id, "srv-42");
        assert_eq!(record.remote_id(), Some("srv-42"));
        assert_eq!(record.source, RecordSource::Server);
        assert!(record.uploaded);
        assert_eq!(record.timestamp, fallback);
        assert_eq!(record.model_id(), Some("m1"));
        assert_eq!(record.crag_id(), Some("c1"));
        assert_eq!(record.route_id(), Some("r9"));
    }

    #[test]
    fn test_into_record_without_references() {
        let created = Utc::now() - chrono::Duration::days(2);
        let remote = RemoteRecord {
            remote_record_id: "srv-1".to_string(),
            model: None,
            route: None,
            payload: Value::Null,
            created_at: Some(created),
        };

        let record = remote.into_record(Utc::now());
        assert_eq!(record.timestamp, created);
        assert!(record.model_id().is_none());
        assert!(record.route_id().is_none());
    }

    #[tokio::test]
    async fn test_offline_gateway_fails_everything() {
        let gateway = OfflineGateway;
        assert_eq!(
            gateway.list_for_current_user().await,
            Err(GatewayError::Offline)
        );
        assert_eq!(gateway.delete("srv-1").await, Err(GatewayError::Offline));
        assert_eq!(
            gateway.create("m1", "r1", &Value::Null).await,
            Err(GatewayError::Offline)
        );
    }
}
