//! Plain-text rendering of records.

use std::fmt::Write;

use crate::reconcile::{DisplayRecord, Reconciliation};
use crate::record::{RecordState, RouteRecord};

/// Short label for where a record lives.
#[must_use]
pub fn state_label(record: &RouteRecord) -> &'static str {
    match record.state() {
        RecordState::LocalOnly => "local",
        RecordState::LocalUploaded => "uploaded",
        RecordState::ServerOnly => "server",
    }
}

/// One line describing a record.
#[must_use]
pub fn record_line(item: &DisplayRecord) -> String {
    format!(
        "{:<16} {:<9} {}  {} / {}  {}",
        item.record.id,
        state_label(&item.record),
        item.record.timestamp.format("%Y-%m-%d %H:%M"),
        item.model_name,
        item.route_name,
        item.display_name,
    )
}

/// All records of a view, followed by a note when the remote part is missing.
#[must_use]
pub fn record_table(view: &Reconciliation) -> String {
    let mut out = String::new();
    if view.is_empty() {
        out.push_str("No records.\n");
    }
    for item in &view.records {
        out.push_str(&record_line(item));
        out.push('\n');
    }
    if let Some(error) = &view.remote_error {
        let _ = writeln!(out, "\nRemote records unavailable: {error}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NewRecord, RecordFilter};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn item() -> DisplayRecord {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let record = NewRecord::new("m1", Value::Null)
            .with_name("Warmup")
            .into_record("1705314600000".to_string(), timestamp);
        DisplayRecord {
            display_name: record.display_name(),
            model_name: "North Face".to_string(),
            route_name: "Unknown".to_string(),
            record,
        }
    }

    #[test]
    fn test_state_label() {
        let mut record = item().record;
        assert_eq!(state_label(&record), "local");
        record.uploaded = true;
        record.remote_id = Some("srv-1".to_string());
        assert_eq!(state_label(&record), "uploaded");
    }

    #[test]
    fn test_record_line() {
        let line = record_line(&item());
        assert!(line.starts_with("1705314600000"));
        assert!(line.contains("2024-01-15 10:30"));
        assert!(line.contains("North Face / Unknown"));
        assert!(line.ends_with("Warmup"));
    }

    #[test]
    fn test_record_table_reports_remote_failure() {
        let view = Reconciliation {
            filter: RecordFilter::All,
            records: vec![item()],
            remote_error: Some("remote service unavailable".to_string()),
        };
        let table = record_table(&view);
        assert_eq!(table.lines().next().map(|l| l.contains("Warmup")), Some(true));
        assert!(table.contains("Remote records unavailable: remote service unavailable"));
    }

    #[test]
    fn test_record_table_empty() {
        assert_eq!(record_table(&Reconciliation::default()), "No records.\n");
    }
}
