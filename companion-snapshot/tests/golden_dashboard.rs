use std::fs;

use companion_core::{
    DoseProgress, Fraction, MetricType, MetricsConfig, MoodScore, Period, Permission, RangeStatus,
    TrendDirection, ViewRequest, ViewValue,
};
use companion_snapshot::{evaluate_loaded, evaluate_snapshot_str, load_snapshot_str};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn snapshot_fixture() -> String {
    fs::read_to_string(fixture_path("companion_snapshot.json")).expect("snapshot fixture missing")
}

#[test]
fn dashboard_matches_golden() {
    let results = evaluate_snapshot_str(
        &snapshot_fixture(),
        &ViewRequest::dashboard(),
        None,
        &MetricsConfig::default(),
    )
    .expect("dashboard evaluation failed");

    let mut actual = serde_json::to_value(results).expect("results do not serialize");
    normalize_floats(&mut actual);

    let expected = fs::read_to_string(fixture_path("companion_dashboard.json"))
        .expect("golden dashboard missing");
    let mut expected_value: Value = serde_json::from_str(&expected).expect("golden is not JSON");
    normalize_floats(&mut expected_value);

    assert_eq!(actual, expected_value);
}

#[test]
fn snapshot_detail_views() {
    let loaded = load_snapshot_str(&snapshot_fixture()).expect("snapshot does not load");
    assert_eq!(loaded.skipped, 1);

    let config = MetricsConfig::default();
    let requests = vec![
        ViewRequest::TodaysDoses,
        ViewRequest::NextDose,
        ViewRequest::MedicationAdherence {
            medication_id: "m2".to_string(),
            period: Period::Days7,
        },
        ViewRequest::VitalTrend {
            metric: MetricType::HeartRate,
            period: Period::Days7,
        },
        ViewRequest::VitalAverage {
            metric: MetricType::BloodPressure,
            period: Period::Days7,
        },
        ViewRequest::ActiveCaregivers,
        ViewRequest::CaregiversWithPermission {
            permission: Permission::ViewVitals,
        },
        ViewRequest::ConnectedDevices,
        ViewRequest::ActiveMedications,
        ViewRequest::SymptomFrequency {
            period: Period::Days7,
        },
        ViewRequest::AverageMood {
            period: Period::Days7,
        },
        ViewRequest::VitalTrend {
            metric: MetricType::Glucose,
            period: Period::Days30,
        },
    ];
    let results = evaluate_loaded(&loaded, &requests, None, &config).expect("views failed");

    assert_eq!(
        results[0].value,
        Some(ViewValue::Rate(Fraction {
            numerator: 2,
            denominator: 3
        }))
    );

    match &results[1].value {
        Some(ViewValue::Dose(dose)) => assert_eq!(dose.id, "d3"),
        other => panic!("unexpected next dose: {other:?}"),
    }

    assert_eq!(
        results[2].value,
        Some(ViewValue::Rate(Fraction {
            numerator: 1,
            denominator: 3
        }))
    );

    let Some(ViewValue::Trend(heart_rate)) = &results[3].value else {
        panic!("expected heart rate trend");
    };
    assert_eq!(heart_rate.sample_count, 7);
    assert_eq!(heart_rate.latest, 76.0);
    assert_eq!(heart_rate.previous, Some(74.0));
    assert_eq!(heart_rate.direction, TrendDirection::Increasing);
    assert_eq!(heart_rate.range_status, RangeStatus::Normal);
    assert!((heart_rate.average - 517.0 / 7.0).abs() < 1e-9);
    assert!((heart_rate.percent_change.unwrap() - 2.0 / 74.0 * 100.0).abs() < 1e-9);
    assert_eq!(results[3].window_description, "last 7 days");

    // Systolic component.
    assert_eq!(results[4].value, Some(ViewValue::Number(120.0)));

    assert_eq!(results[5].value, Some(ViewValue::Count(3)));
    // f1 has every permission, f2 lists it, f3 gets it from the limited level.
    assert_eq!(results[6].value, Some(ViewValue::Count(3)));
    assert_eq!(results[7].value, Some(ViewValue::Count(3)));
    assert_eq!(results[8].value, Some(ViewValue::Count(2)));

    let Some(ViewValue::Symptoms(symptoms)) = &results[9].value else {
        panic!("expected symptom counts");
    };
    let counts: Vec<(&str, usize)> = symptoms
        .iter()
        .map(|entry| (entry.name.as_str(), entry.count))
        .collect();
    assert_eq!(counts, vec![("Fatigue", 2), ("Nausea", 1)]);

    assert_eq!(results[10].value, Some(ViewValue::Number(6.0)));
    assert_eq!(MoodScore::new(6).map(|score| score.label()), Ok("Okay"));

    assert_eq!(results[11].value, None);
    assert_eq!(results[11].window_description, "last 30 days");
}

#[test]
fn local_offset_moves_today() {
    // UTC-8: the local day runs 2024-01-20T08:00Z..2024-01-21T08:00Z.
    let config = MetricsConfig {
        utc_offset_minutes: -8 * 60,
        ..MetricsConfig::default()
    };
    let results = evaluate_snapshot_str(
        &snapshot_fixture(),
        &[ViewRequest::DoseProgress],
        None,
        &config,
    )
    .expect("dose progress failed");

    assert_eq!(
        results[0].value,
        Some(ViewValue::Progress(DoseProgress { taken: 2, total: 4 }))
    );
}

fn normalize_floats(value: &mut Value) {
    match value {
        Value::Number(number) if number.is_f64() => {
            if let Some(rounded) = number
                .as_f64()
                .map(|f| (f * 1e6).round() / 1e6)
                .and_then(serde_json::Number::from_f64)
            {
                *number = rounded;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_floats),
        Value::Object(map) => map.values_mut().for_each(normalize_floats),
        _ => {}
    }
}
