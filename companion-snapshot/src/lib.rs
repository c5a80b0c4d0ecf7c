//! JSON snapshot document to `InMemoryStore` loader, plus helpers that
//! evaluate views straight from a snapshot.
//!
//! A snapshot looks like:
//!
//! ```json
//! {
//!   "resourceType": "CompanionSnapshot",
//!   "as_of": "2024-01-20T14:00:00Z",
//!   "entry": [{ "kind": "dose", "id": "d1", ... }]
//! }
//! ```

use chrono::{DateTime, Utc};
use companion_core::{
    Entity, EntityCategory, InMemoryStore, MetricsConfig, MetricsError, ViewEngine, ViewRequest,
    ViewResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const SNAPSHOT_RESOURCE_TYPE: &str = "CompanionSnapshot";

/// Store built from a snapshot document.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub store: InMemoryStore,
    /// Instant the snapshot was exported, when recorded.
    pub as_of: Option<DateTime<Utc>>,
    /// Entries skipped because their kind is unknown.
    pub skipped: usize,
}

impl LoadedSnapshot {
    /// Instant to evaluate views at when the caller does not supply one: the
    /// recorded export time, else the latest entity timestamp.
    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.as_of.or_else(|| self.store.latest_timestamp())
    }
}

/// Load a snapshot from a JSON string.
pub fn load_snapshot_str(snapshot_json: &str) -> Result<LoadedSnapshot, MetricsError> {
    let value: Value = serde_json::from_str(snapshot_json)
        .map_err(|err| MetricsError::Parse(err.to_string()))?;
    load_snapshot_value(&value)
}

/// Load a snapshot from a `serde_json::Value`.
pub fn load_snapshot_value(snapshot: &Value) -> Result<LoadedSnapshot, MetricsError> {
    let resource_type = snapshot
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| MetricsError::Parse("missing resourceType".to_string()))?;

    if resource_type != SNAPSHOT_RESOURCE_TYPE {
        return Err(MetricsError::Parse(format!(
            "Expected resourceType {SNAPSHOT_RESOURCE_TYPE}, received {resource_type}"
        )));
    }

    let as_of = match snapshot.get("as_of") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let text = value
                .as_str()
                .ok_or_else(|| MetricsError::Parse("as_of must be a string".to_string()))?;
            Some(parse_datetime(text).ok_or_else(|| {
                MetricsError::Parse(format!("as_of is not an RFC 3339 timestamp: {text}"))
            })?)
        }
    };

    let entries = snapshot
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| MetricsError::Parse("missing entry array".to_string()))?;

    let mut store = InMemoryStore::new();
    let mut skipped = 0;

    for (index, entry) in entries.iter().enumerate() {
        let Some(kind) = entry.get("kind").and_then(Value::as_str) else {
            warn!(index, "snapshot entry has no kind, skipping");
            skipped += 1;
            continue;
        };

        if EntityCategory::from_kind(kind).is_none() {
            warn!(index, kind, "unknown snapshot entry kind, skipping");
            skipped += 1;
            continue;
        }

        let entity = Entity::deserialize(entry)
            .map_err(|err| MetricsError::Parse(format!("entry {index} ({kind}): {err}")))?;
        store.insert(entity)?;
    }

    debug!(entities = store.len(), skipped, "snapshot loaded");

    Ok(LoadedSnapshot {
        store,
        as_of,
        skipped,
    })
}

/// Evaluate views over a snapshot JSON string. `now` defaults to the
/// snapshot anchor.
pub fn evaluate_snapshot_str(
    snapshot_json: &str,
    requests: &[ViewRequest],
    now: Option<DateTime<Utc>>,
    config: &MetricsConfig,
) -> Result<Vec<ViewResult>, MetricsError> {
    let snapshot = load_snapshot_str(snapshot_json)?;
    evaluate_loaded(&snapshot, requests, now, config)
}

/// Evaluate views over a snapshot `serde_json::Value`.
pub fn evaluate_snapshot_value(
    snapshot: &Value,
    requests: &[ViewRequest],
    now: Option<DateTime<Utc>>,
    config: &MetricsConfig,
) -> Result<Vec<ViewResult>, MetricsError> {
    let snapshot = load_snapshot_value(snapshot)?;
    evaluate_loaded(&snapshot, requests, now, config)
}

pub fn evaluate_loaded(
    snapshot: &LoadedSnapshot,
    requests: &[ViewRequest],
    now: Option<DateTime<Utc>>,
    config: &MetricsConfig,
) -> Result<Vec<ViewResult>, MetricsError> {
    let now = now
        .or_else(|| snapshot.anchor())
        .ok_or(MetricsError::EmptyInput)?;
    ViewEngine::new(&snapshot.store, config).evaluate_all(requests, now)
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn rejects_other_documents() {
        let err = load_snapshot_value(&json!({"resourceType": "Bundle", "entry": []})).unwrap_err();
        assert_eq!(
            err,
            MetricsError::Parse(
                "Expected resourceType CompanionSnapshot, received Bundle".to_string()
            )
        );

        assert!(load_snapshot_value(&json!({"entry": []})).is_err());
        assert!(load_snapshot_value(&json!({"resourceType": "CompanionSnapshot"})).is_err());
        assert!(matches!(
            load_snapshot_str("not json"),
            Err(MetricsError::Parse(_))
        ));
    }

    #[test]
    fn skips_unknown_kinds_and_keeps_order() {
        let snapshot = json!({
            "resourceType": "CompanionSnapshot",
            "entry": [
                {"kind": "message", "id": "2", "sender": "Dr. Johnson", "role": "Cardiologist",
                 "body": "See you Friday.", "sent_at": "2024-01-19T10:00:00Z", "unread": false},
                {"kind": "insurance_card", "id": "x"},
                {"id": "no-kind"},
                {"kind": "message", "id": "1", "sender": "Dr. Smith", "role": "Oncologist",
                 "body": "Results look good.", "sent_at": "2024-01-20T12:00:00Z", "unread": true}
            ]
        });

        let loaded = load_snapshot_value(&snapshot).unwrap();
        assert_eq!(loaded.skipped, 2);
        assert_eq!(loaded.store.len(), 2);

        use companion_core::EntityStore;
        let ids: Vec<String> = loaded
            .store
            .messages()
            .into_iter()
            .map(|message| message.id)
            .collect();
        assert_eq!(ids, vec!["2".to_string(), "1".to_string()]);
        assert_eq!(
            loaded.anchor(),
            Some(Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_known_entry_fails() {
        let snapshot = json!({
            "resourceType": "CompanionSnapshot",
            "entry": [{"kind": "dose", "id": "d1", "status": "taken"}]
        });
        let err = load_snapshot_value(&snapshot).unwrap_err();
        match err {
            MetricsError::Parse(message) => assert!(message.starts_with("entry 0 (dose)")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_mood_fails_to_load() {
        for mood in [0, 11, 200] {
            let snapshot = json!({
                "resourceType": "CompanionSnapshot",
                "entry": [
                    {"kind": "symptom_log", "id": "s1", "logged_at": "2024-01-20T09:00:00Z",
                     "mood": 6, "symptoms": ["Fatigue"]},
                    {"kind": "symptom_log", "id": "s2", "logged_at": "2024-01-20T12:00:00Z",
                     "mood": mood, "symptoms": []}
                ]
            });
            match load_snapshot_value(&snapshot).unwrap_err() {
                MetricsError::Parse(message) => {
                    assert!(message.starts_with("entry 1 (symptom_log)"), "{message}")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let valid = json!({
            "resourceType": "CompanionSnapshot",
            "entry": [{"kind": "symptom_log", "id": "s1", "logged_at": "2024-01-20T09:00:00Z",
                       "mood": 10}]
        });
        let results = evaluate_snapshot_value(
            &valid,
            &[ViewRequest::AverageMood {
                period: companion_core::Period::Today,
            }],
            None,
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_eq!(results[0].value.as_ref().and_then(|v| v.as_f64()), Some(10.0));
    }

    #[test]
    fn duplicate_entries_fail() {
        let dose = json!({"kind": "dose", "id": "d1", "medication_id": "m1",
                          "scheduled_time": "2024-01-20T08:00:00Z", "status": "taken"});
        let snapshot = json!({
            "resourceType": "CompanionSnapshot",
            "entry": [dose.clone(), dose]
        });
        assert_eq!(
            load_snapshot_value(&snapshot).unwrap_err(),
            MetricsError::DuplicateId {
                category: EntityCategory::Dose,
                id: "d1".to_string()
            }
        );
    }

    #[test]
    fn explicit_as_of_wins_over_entity_timestamps() {
        let snapshot = json!({
            "resourceType": "CompanionSnapshot",
            "as_of": "2024-01-21T00:00:00+02:00",
            "entry": [{"kind": "dose", "id": "d1", "medication_id": "m1",
                       "scheduled_time": "2024-01-20T08:00:00Z", "status": "missed"}]
        });
        let loaded = load_snapshot_value(&snapshot).unwrap();
        assert_eq!(
            loaded.anchor(),
            Some(Utc.with_ymd_and_hms(2024, 1, 20, 22, 0, 0).unwrap())
        );

        let results = evaluate_loaded(
            &loaded,
            &[ViewRequest::TodaysDoses],
            None,
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_eq!(results[0].value.as_ref().and_then(|v| v.as_f64()), Some(0.0));
    }

    #[test]
    fn empty_snapshot_needs_explicit_now() {
        let empty = r#"{"resourceType": "CompanionSnapshot", "entry": []}"#;
        assert_eq!(
            evaluate_snapshot_str(empty, &[ViewRequest::TodaysDoses], None, &MetricsConfig::default())
                .unwrap_err(),
            MetricsError::EmptyInput
        );

        let now = Utc.with_ymd_and_hms(2024, 1, 20, 14, 0, 0).unwrap();
        let results = evaluate_snapshot_str(
            empty,
            &[ViewRequest::TodaysDoses],
            Some(now),
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_eq!(results[0].value, None);
        assert_eq!(results[0].window_description, "today");
    }
}
