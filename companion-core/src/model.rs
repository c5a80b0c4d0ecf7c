//! Records read from the entity store. All of them are plain data; the only
//! behaviour here is what a record can tell about itself.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MoodScore;

/// Vital tracked by readings and trend charts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    HeartRate,
    BloodPressure,
    Temperature,
    Weight,
    Oxygen,
    Glucose,
}

impl MetricType {
    pub const ALL: [MetricType; 6] = [
        MetricType::HeartRate,
        MetricType::BloodPressure,
        MetricType::Temperature,
        MetricType::Weight,
        MetricType::Oxygen,
        MetricType::Glucose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "heart_rate",
            MetricType::BloodPressure => "blood_pressure",
            MetricType::Temperature => "temperature",
            MetricType::Weight => "weight",
            MetricType::Oxygen => "oxygen",
            MetricType::Glucose => "glucose",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "Heart Rate",
            MetricType::BloodPressure => "Blood Pressure",
            MetricType::Temperature => "Temperature",
            MetricType::Weight => "Weight",
            MetricType::Oxygen => "Oxygen Saturation",
            MetricType::Glucose => "Blood Glucose",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricType::HeartRate => "bpm",
            MetricType::BloodPressure => "mmHg",
            MetricType::Temperature => "°F",
            MetricType::Weight => "lbs",
            MetricType::Oxygen => "%",
            MetricType::Glucose => "mg/dL",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        MetricType::ALL
            .into_iter()
            .find(|metric| metric.as_str() == normalized)
            .ok_or_else(|| format!("unknown metric type: {s}"))
    }
}

/// Measured value. Blood pressure is the only composite vital.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ReadingValue {
    Scalar(f64),
    BloodPressure { systolic: f64, diastolic: f64 },
}

impl ReadingValue {
    /// Value plotted on charts and compared against normal ranges. For blood
    /// pressure this is the systolic component.
    pub fn primary(&self) -> f64 {
        match self {
            ReadingValue::Scalar(value) => *value,
            ReadingValue::BloodPressure { systolic, .. } => *systolic,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            ReadingValue::Scalar(value) => value.is_finite(),
            ReadingValue::BloodPressure {
                systolic,
                diastolic,
            } => systolic.is_finite() && diastolic.is_finite(),
        }
    }
}

/// A recorded vital sign. Appended only, never edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub id: String,
    pub metric_type: MetricType,
    pub value: ReadingValue,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub within_normal_range: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Pending,
    Taken,
    Missed,
}

impl DoseStatus {
    /// Pending resolves to taken or missed exactly once.
    pub fn can_transition_to(self, next: DoseStatus) -> bool {
        matches!(
            (self, next),
            (DoseStatus::Pending, DoseStatus::Taken) | (DoseStatus::Pending, DoseStatus::Missed)
        )
    }

    pub fn is_resolved(self) -> bool {
        !matches!(self, DoseStatus::Pending)
    }
}

/// One scheduled intake of a medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dose {
    pub id: String,
    pub medication_id: String,
    pub scheduled_time: DateTime<Utc>,
    #[serde(default)]
    pub taken_time: Option<DateTime<Utc>>,
    pub status: DoseStatus,
}

/// Prescribed medication. Adherence is always derived from doses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    /// Daily intake times; empty for as-needed medications.
    #[serde(default)]
    pub schedule: Vec<NaiveTime>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub reminder_enabled: bool,
}

impl Medication {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.map_or(true, |end| date <= end)
    }

    pub fn is_as_needed(&self) -> bool {
        self.schedule.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    Consultation,
    LabTest,
    FollowUp,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Upcoming,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub doctor: Option<String>,
    pub appointment_type: AppointmentKind,
    pub location: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
}

/// Care team message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub role: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Full,
    Limited,
    Emergency,
}

impl AccessLevel {
    /// Permissions granted when a member has none recorded explicitly.
    pub fn default_permissions(self) -> &'static [Permission] {
        match self {
            AccessLevel::Full => &Permission::ALL,
            AccessLevel::Limited => &[
                Permission::ViewAppointments,
                Permission::ViewMedications,
                Permission::ViewVitals,
                Permission::MedicationReminders,
            ],
            AccessLevel::Emergency => &[Permission::EmergencyContact],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewAppointments,
    ViewMedications,
    ViewVitals,
    ViewSymptoms,
    ViewMessages,
    EmergencyContact,
    ManageAppointments,
    MedicationReminders,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::ViewAppointments,
        Permission::ViewMedications,
        Permission::ViewVitals,
        Permission::ViewSymptoms,
        Permission::ViewMessages,
        Permission::EmergencyContact,
        Permission::ManageAppointments,
        Permission::MedicationReminders,
    ];
}

/// Family member or caregiver with access to the patient's record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    pub relationship: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub access_level: AccessLevel,
    pub is_active: bool,
    #[serde(default)]
    pub last_access: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl FamilyMember {
    pub fn effective_permissions(&self) -> &[Permission] {
        if self.permissions.is_empty() {
            self.access_level.default_permissions()
        } else {
            &self.permissions
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.effective_permissions().contains(&permission)
    }
}

/// Paired wearable or home device feeding readings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthDevice {
    pub id: String,
    pub name: String,
    pub device_type: String,
    pub connected: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub battery_level: Option<u8>,
}

/// Daily symptom and mood entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymptomLog {
    pub id: String,
    pub logged_at: DateTime<Utc>,
    pub mood: MoodScore,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
