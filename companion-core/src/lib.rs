//! Core logic behind the health companion screens: entity models, pure metric
//! calculations, predicate filtering over time windows and on-demand views.
//!
//! Nothing in this crate reads a clock, touches the network or writes
//! anywhere. Every "now" is a parameter.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

pub mod command;
pub mod metrics;
pub mod model;
pub mod query;
pub mod store;
pub mod views;

pub use command::{dispatch, Command, CommandHandler, CommandOutcome};
pub use metrics::{
    adherence_rate, average, dose_progress, next_dose, normal_range_status, percent_change,
    symptom_frequency, trend_direction, trend_summary, DoseProgress, Fraction, MoodBand,
    MoodScore, NormalRange, RangeStatus, SymptomCount, TrendDirection, TrendSummary,
};
pub use model::{
    AccessLevel, Appointment, AppointmentKind, AppointmentStatus, Dose, DoseStatus, FamilyMember,
    HealthDevice, Medication, Message, MetricType, Permission, Reading, ReadingValue, SymptomLog,
};
pub use query::{
    bucket_by_period, category_in, filter_by_predicate, status_is, within, Bucket, Categorized,
    HasStatus, Period, Query, TimeWindow, Timestamped,
};
pub use store::{Entity, EntityCategory, EntityStore, InMemoryStore};
pub use views::{ViewEngine, ViewRequest, ViewResult, ViewValue};

/// Tunable thresholds shared by every view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Normal ranges used for range status of each vital.
    pub normal_ranges: NormalRanges,
    /// Offset of the patient's local time from UTC, in minutes. Decides where
    /// "today" starts and ends.
    pub utc_offset_minutes: i32,
    /// How far ahead (days) an appointment still counts as upcoming.
    pub upcoming_window_days: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            normal_ranges: NormalRanges::default(),
            utc_offset_minutes: 0,
            upcoming_window_days: 30,
        }
    }
}

impl MetricsConfig {
    /// Local offset for calendar-day windows. Out-of-range values fall back
    /// to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            tracing::warn!(
                utc_offset_minutes = self.utc_offset_minutes,
                "utc offset out of range, using UTC"
            );
            Utc.fix()
        })
    }
}

/// Normal range for each tracked vital.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalRanges {
    pub heart_rate: NormalRange,
    pub blood_pressure: NormalRange,
    pub temperature: NormalRange,
    pub weight: NormalRange,
    pub oxygen: NormalRange,
    pub glucose: NormalRange,
}

impl Default for NormalRanges {
    fn default() -> Self {
        Self {
            heart_rate: NormalRange { min: 60.0, max: 100.0 },
            // Systolic, mmHg.
            blood_pressure: NormalRange { min: 90.0, max: 140.0 },
            temperature: NormalRange { min: 97.0, max: 99.0 },
            weight: NormalRange { min: 150.0, max: 180.0 },
            oxygen: NormalRange { min: 95.0, max: 100.0 },
            glucose: NormalRange { min: 70.0, max: 140.0 },
        }
    }
}

impl NormalRanges {
    pub fn for_metric(&self, metric: MetricType) -> &NormalRange {
        match metric {
            MetricType::HeartRate => &self.heart_rate,
            MetricType::BloodPressure => &self.blood_pressure,
            MetricType::Temperature => &self.temperature,
            MetricType::Weight => &self.weight,
            MetricType::Oxygen => &self.oxygen,
            MetricType::Glucose => &self.glucose,
        }
    }

    pub fn set(&mut self, metric: MetricType, range: NormalRange) {
        match metric {
            MetricType::HeartRate => self.heart_rate = range,
            MetricType::BloodPressure => self.blood_pressure = range,
            MetricType::Temperature => self.temperature = range,
            MetricType::Weight => self.weight = range,
            MetricType::Oxygen => self.oxygen = range,
            MetricType::Glucose => self.glucose = range,
        }
    }
}

/// Errors returned by calculations, views and adapters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("No data available for aggregation")]
    EmptyInput,
    #[error("Calculation has a zero denominator")]
    DivisionUndefined,
    #[error("Normal range minimum {min} is greater than maximum {max}")]
    InvalidRange { min: f64, max: f64 },
    #[error("Mood rating {0} is outside 1..=10")]
    InvalidMood(u8),
    #[error("Command rejected: {0}")]
    InvalidCommand(String),
    #[error("Duplicate {category} id: {id}")]
    DuplicateId { category: EntityCategory, id: String },
    #[error("Could not read snapshot: {0}")]
    Parse(String),
}
