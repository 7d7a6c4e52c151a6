//! Partial updates applied to stored records.

use chrono::{DateTime, Utc};

use crate::record::RouteRecord;

/// A set of field changes for [`LocalRecordStore::update`](super::LocalRecordStore::update).
///
/// Unset fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// New upload flag.
    pub uploaded: Option<bool>,
    /// New remote id.
    pub remote_id: Option<String>,
    /// Upload time.
    pub uploaded_at: Option<DateTime<Utc>>,
    /// New route assignment.
    pub route_id: Option<String>,
    /// New display label.
    pub custom_name: Option<String>,
}

impl RecordPatch {
    /// Record a confirmed upload.
    #[must_use]
    pub fn mark_uploaded(remote_id: impl Into<String>) -> Self {
        Self {
            uploaded: Some(true),
            remote_id: Some(remote_id.into()),
            uploaded_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Assign a route.
    #[must_use]
    pub fn assign_route(route_id: impl Into<String>) -> Self {
        Self {
            route_id: Some(route_id.into()),
            ..Self::default()
        }
    }

    /// Change the display label.
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            custom_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a record in place.
    pub fn apply(&self, record: &mut RouteRecord) {
        if let Some(uploaded) = self.uploaded {
            record.uploaded = uploaded;
        }
        if let Some(remote_id) = &self.remote_id {
            record.remote_id = Some(remote_id.clone());
        }
        if let Some(uploaded_at) = self.uploaded_at {
            record.uploaded_at = Some(uploaded_at);
        }
        if let Some(route_id) = &self.route_id {
            record.route_id = Some(route_id.clone());
        }
        if let Some(name) = &self.custom_name {
            record.custom_name = Some(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewRecord;
    use serde_json::Value;

    fn record() -> RouteRecord {
        NewRecord::new("m1", Value::Null).into_record("1".to_string(), Utc::now())
    }

    #[test]
    fn test_mark_uploaded() {
        let mut record = record();
        RecordPatch::mark_uploaded("srv-1").apply(&mut record);

        assert!(record.uploaded);
        assert_eq!(record.remote_id(), Some("srv-1"));
        assert!(record.uploaded_at.is_some());
        assert!(record.route_id.is_none());
    }

    #[test]
    fn test_assign_route_leaves_other_fields() {
        let mut record = record();
        record.custom_name = Some("Keep".to_string());
        RecordPatch::assign_route("r9").apply(&mut record);

        assert_eq!(record.route_id(), Some("r9"));
        assert_eq!(record.custom_name.as_deref(), Some("Keep"));
        assert!(!record.uploaded);
    }

    #[test]
    fn test_is_empty() {
        assert!(RecordPatch::default().is_empty());
        assert!(!RecordPatch::rename("x").is_empty());
    }
}
