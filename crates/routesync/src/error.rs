//! Error types for routesync.
//!
//! This module defines all error types used throughout the routesync crate.
//! Variants fall into four families: storage, validation, remote and
//! configuration. Validation errors always need a corrective user action and
//! are never retried automatically.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::GatewayError;

/// The main error type for routesync operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to read the persisted record collection.
    #[error("failed to read records from {path}: {source}")]
    StorageRead {
        /// Path to the records file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the persisted record collection.
    #[error("failed to write records to {path}: {source}")]
    StorageWrite {
        /// Path to the records file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The records file exists but does not hold a valid record list.
    #[error("records file {path} is corrupt: {source}")]
    StorageCorrupt {
        /// Path to the records file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No local record carries the given id.
    #[error("record {id} not found in local store")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    // === Validation Errors ===
    /// The record has no model id and cannot be uploaded.
    #[error("record {record_id} has no model id")]
    MissingModelId {
        /// Id of the offending record.
        record_id: String,
    },

    /// The record has no route assigned and cannot be uploaded.
    #[error("record {record_id} has no route assigned; assign a route before uploading")]
    MissingRouteAssignment {
        /// Id of the offending record.
        record_id: String,
    },

    /// The assigned route id does not resolve to a known route.
    #[error("record {record_id} is assigned to unknown route {route_id}; select a route from the crag")]
    InvalidRouteAssignment {
        /// Id of the offending record.
        record_id: String,
        /// The route id that could not be resolved.
        route_id: String,
    },

    /// The record has no crag id, so route candidates cannot be loaded.
    #[error("record {record_id} has no crag information")]
    MissingCragContext {
        /// Id of the offending record.
        record_id: String,
    },

    /// The record cannot be edited in its current state.
    #[error("record {record_id} is read-only: {reason}")]
    ReadOnlyRecord {
        /// Id of the offending record.
        record_id: String,
        /// Why the record cannot be edited.
        reason: &'static str,
    },

    /// The record was already uploaded.
    #[error("record {record_id} is already uploaded")]
    AlreadyUploaded {
        /// Id of the offending record.
        record_id: String,
    },

    /// A rename was requested with an empty name.
    #[error("name for record {record_id} cannot be empty")]
    EmptyName {
        /// Id of the offending record.
        record_id: String,
    },

    /// An upload for the record is already outstanding.
    #[error("upload of record {record_id} is already in progress")]
    AlreadyInProgress {
        /// Id of the offending record.
        record_id: String,
    },

    // === Remote Errors ===
    /// A call to the remote service failed.
    #[error("remote {operation} failed{}: {source}", fmt_record(.record_id.as_deref()))]
    Remote {
        /// The remote operation that failed.
        operation: &'static str,
        /// The record the call was made for, if any.
        record_id: Option<String>,
        /// The gateway failure.
        #[source]
        source: GatewayError,
    },

    /// The remote create succeeded but returned no record id.
    #[error("upload of record {record_id} succeeded but the server returned no id")]
    MalformedServerResponse {
        /// Id of the uploaded record.
        record_id: String,
    },

    /// A remote operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Generic Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

fn fmt_record(record_id: Option<&str>) -> String {
    record_id.map(|id| format!(" for record {id}")).unwrap_or_default()
}

/// A specialized Result type for routesync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap a gateway failure with the operation and record it concerns.
    #[must_use]
    pub fn remote(operation: &'static str, record_id: Option<&str>, source: GatewayError) -> Self {
        Self::Remote {
            operation,
            record_id: record_id.map(str::to_string),
            source,
        }
    }

    /// Check if this error needs a corrective user action.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingModelId { .. }
                | Self::MissingRouteAssignment { .. }
                | Self::InvalidRouteAssignment { .. }
                | Self::MissingCragContext { .. }
                | Self::ReadOnlyRecord { .. }
                | Self::AlreadyUploaded { .. }
                | Self::EmptyName { .. }
                | Self::AlreadyInProgress { .. }
        )
    }

    /// Check if this error came from the remote service.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Remote { .. } | Self::MalformedServerResponse { .. } | Self::Timeout { .. }
        )
    }

    /// Check if this error came from the local store.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::StorageRead { .. }
                | Self::StorageWrite { .. }
                | Self::StorageCorrupt { .. }
                | Self::DirectoryCreate { .. }
                | Self::NotFound { .. }
        )
    }

    /// The record this error concerns, if any.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { id } => Some(id),
            Self::MissingModelId { record_id }
            | Self::MissingRouteAssignment { record_id }
            | Self::InvalidRouteAssignment { record_id, .. }
            | Self::MissingCragContext { record_id }
            | Self::ReadOnlyRecord { record_id, .. }
            | Self::AlreadyUploaded { record_id }
            | Self::EmptyName { record_id }
            | Self::AlreadyInProgress { record_id }
            | Self::MalformedServerResponse { record_id } => Some(record_id),
            Self::Remote { record_id, .. } => record_id.as_deref(),
            _ => None,
        }
    }
}
