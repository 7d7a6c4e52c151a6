//! Core record types for routesync.
//!
//! A [`RouteRecord`] is a captured route annotation: opaque scene coordinate
//! data attached to a climbing route. Records are created offline, may be
//! uploaded later, and can also arrive from the remote service directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where the in-memory representation of a record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// The record lives in the local store.
    #[default]
    Local,
    /// The record only exists on the remote service.
    Server,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Server => write!(f, "server"),
        }
    }
}

/// Lifecycle state of a record, as far as deletion is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Local record that was never uploaded.
    LocalOnly,
    /// Local record with a confirmed remote copy.
    LocalUploaded,
    /// Record that only exists remotely.
    ServerOnly,
}

/// Which provenance a reconciled view should include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    /// Every record.
    #[default]
    All,
    /// Only records with `source == local`.
    Local,
    /// Only records with `source == server`.
    Server,
}

impl RecordFilter {
    /// Check whether a record passes this filter.
    #[must_use]
    pub fn matches(self, record: &RouteRecord) -> bool {
        match self {
            Self::All => true,
            Self::Local => record.source == RecordSource::Local,
            Self::Server => record.source == RecordSource::Server,
        }
    }
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Local => write!(f, "local"),
            Self::Server => write!(f, "server"),
        }
    }
}

impl FromStr for RecordFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "local" => Ok(Self::Local),
            "server" => Ok(Self::Server),
            other => Err(format!("unknown record filter: {other}")),
        }
    }
}

/// A captured route annotation record.
///
/// The serialized form is one element of the persisted JSON array. Every field
/// except the identity is optional on read so files written by older builds
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    /// Locally generated id, unique within the local store.
    #[serde(default)]
    pub id: String,

    /// Creation time, used for newest-first ordering. Records stored without
    /// one read as the Unix epoch and are written back without it.
    #[serde(default, skip_serializing_if = "is_unset")]
    pub timestamp: DateTime<Utc>,

    /// Provenance of this representation.
    #[serde(default)]
    pub source: RecordSource,

    /// True once a successful create response has been recorded.
    #[serde(default)]
    pub uploaded: bool,

    /// The server's canonical id.
    #[serde(default, alias = "route_data_id", skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    /// When the upload was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,

    /// Foreign key to the captured model/scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// Foreign key to the parent crag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crag_id: Option<String>,

    /// Foreign key to the route this record documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,

    /// Capture data; never interpreted here.
    #[serde(default, alias = "routeData")]
    pub payload: Value,

    /// User-editable display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,

    /// Fields written by other clients, carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_unset(timestamp: &DateTime<Utc>) -> bool {
    *timestamp == DateTime::<Utc>::default()
}

impl RouteRecord {
    /// Classify the record for the delete workflow.
    #[must_use]
    pub fn state(&self) -> RecordState {
        match self.source {
            RecordSource::Server => RecordState::ServerOnly,
            RecordSource::Local if self.uploaded && self.remote_id().is_some() => {
                RecordState::LocalUploaded
            }
            RecordSource::Local => RecordState::LocalOnly,
        }
    }

    /// The model id, if present and non-empty.
    #[must_use]
    pub fn model_id(&self) -> Option<&str> {
        non_empty(self.model_id.as_deref())
    }

    /// The crag id, if present and non-empty.
    #[must_use]
    pub fn crag_id(&self) -> Option<&str> {
        non_empty(self.crag_id.as_deref())
    }

    /// The assigned route id, if present and non-empty.
    #[must_use]
    pub fn route_id(&self) -> Option<&str> {
        non_empty(self.route_id.as_deref())
    }

    /// The remote id, if present and non-empty.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        non_empty(self.remote_id.as_deref())
    }

    /// Whether the record may be edited locally (renamed or re-assigned).
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.source == RecordSource::Local && !self.uploaded
    }

    /// The label to show for this record.
    ///
    /// Falls back from the custom name to the payload's `route_name` and
    /// finally to a name derived from the id.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = non_empty(self.custom_name.as_deref()) {
            return name.to_string();
        }
        if let Some(name) = non_empty(self.payload.get("route_name").and_then(Value::as_str)) {
            return name.to_string();
        }
        format!("Route Data #{}", id_suffix(&self.id))
    }
}

/// Input for a new local record, as produced by the capture collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecord {
    /// The captured model/scene.
    pub model_id: Option<String>,
    /// The parent crag, needed later to resolve route candidates.
    pub crag_id: Option<String>,
    /// A route, when the capture already knows it.
    pub route_id: Option<String>,
    /// Capture data.
    pub payload: Value,
    /// Initial display label.
    pub custom_name: Option<String>,
}

impl NewRecord {
    /// Create input for a capture of the given model.
    #[must_use]
    pub fn new(model_id: impl Into<String>, payload: Value) -> Self {
        Self {
            model_id: Some(model_id.into()),
            payload,
            ..Self::default()
        }
    }

    /// Set the parent crag.
    #[must_use]
    pub fn with_crag(mut self, crag_id: impl Into<String>) -> Self {
        self.crag_id = Some(crag_id.into());
        self
    }

    /// Set the route.
    #[must_use]
    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    /// Set the display label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Materialize the record with the id and timestamp chosen by the store.
    #[must_use]
    pub fn into_record(self, id: String, timestamp: DateTime<Utc>) -> RouteRecord {
        RouteRecord {
            id,
            timestamp,
            source: RecordSource::Local,
            uploaded: false,
            remote_id: None,
            uploaded_at: None,
            model_id: self.model_id,
            crag_id: self.crag_id,
            route_id: self.route_id,
            payload: self.payload,
            custom_name: self.custom_name,
            extra: Map::new(),
        }
    }
}

/// Last six characters of an id, used in derived display names.
#[must_use]
pub fn id_suffix(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(5)
        .map_or(0, |(index, _)| index);
    &id[start..]
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
