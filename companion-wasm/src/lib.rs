//! WASM <-> JavaScript bridge, independent of any UI framework.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use companion_core::{Command, MetricType, MetricsConfig, MetricsError, NormalRange, ViewRequest};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsRange {
    min: f64,
    max: f64,
}

/// Partial override of [`MetricsConfig`]; missing fields keep defaults.
#[derive(Deserialize)]
struct JsMetricsConfig {
    #[serde(default)]
    utc_offset_minutes: Option<i32>,
    #[serde(default)]
    upcoming_window_days: Option<u32>,
    #[serde(default)]
    normal_ranges: Option<BTreeMap<MetricType, JsRange>>,
}

impl TryFrom<JsMetricsConfig> for MetricsConfig {
    type Error = MetricsError;

    fn try_from(cfg: JsMetricsConfig) -> Result<Self, Self::Error> {
        let mut base = MetricsConfig::default();
        if let Some(minutes) = cfg.utc_offset_minutes {
            base.utc_offset_minutes = minutes;
        }
        if let Some(days) = cfg.upcoming_window_days {
            base.upcoming_window_days = days;
        }
        for (metric, range) in cfg.normal_ranges.unwrap_or_default() {
            base.normal_ranges.set(metric, NormalRange::new(range.min, range.max)?);
        }
        Ok(base)
    }
}

/// One request object or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsRequests {
    Many(Vec<ViewRequest>),
    One(ViewRequest),
}

impl From<JsRequests> for Vec<ViewRequest> {
    fn from(requests: JsRequests) -> Self {
        match requests {
            JsRequests::Many(many) => many,
            JsRequests::One(one) => vec![one],
        }
    }
}

/// Evaluates `requests` over a snapshot document. `now` is an RFC 3339
/// string; without it the snapshot's own time is used.
#[wasm_bindgen]
pub fn evaluate_view(
    snapshot: JsValue,
    requests: JsValue,
    now: Option<String>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let requests: JsRequests = from_value(requests)
        .map_err(|err| JsValue::from_str(&format!("Cannot read view requests: {err}")))?;
    evaluate(snapshot, requests.into(), now, config)
}

/// Stat cards of the dashboard screen.
#[wasm_bindgen]
pub fn dashboard(
    snapshot: JsValue,
    now: Option<String>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    evaluate(snapshot, ViewRequest::dashboard(), now, config)
}

/// Checks a command before the UI hands it to the backend. Resolves to
/// nothing when valid, rejects with the validation message otherwise.
#[wasm_bindgen]
pub fn validate_command(command: JsValue) -> Result<(), JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let command: Command = from_value(command)
        .map_err(|err| JsValue::from_str(&format!("Cannot read command: {err}")))?;
    command
        .validate()
        .map_err(|err| JsValue::from_str(&format_metrics_error(err)))
}

fn evaluate(
    snapshot: JsValue,
    requests: Vec<ViewRequest>,
    now: Option<String>,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    let snapshot_value = from_value::<serde_json::Value>(snapshot)
        .map_err(|err| JsValue::from_str(&format!("Cannot read snapshot JSON: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsMetricsConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?;
            MetricsConfig::try_from(cfg)
                .map_err(|err| JsValue::from_str(&format_metrics_error(err)))?
        }
        None => MetricsConfig::default(),
    };

    let now = now
        .as_deref()
        .map(parse_now)
        .transpose()
        .map_err(|err| JsValue::from_str(&err))?;

    let results =
        companion_snapshot::evaluate_snapshot_value(&snapshot_value, &requests, now, &cfg)
            .map_err(|err| JsValue::from_str(&format_metrics_error(err)))?;

    to_value(&results).map_err(|err| JsValue::from_str(&format!("Cannot serialize views: {err}")))
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("Invalid now timestamp {value}: {err}"))
}

fn format_metrics_error(err: MetricsError) -> String {
    format!("Companion error: {err}")
}
