//! Named views composed from filters and metric calculations.
//!
//! A view is evaluated synchronously against the store whenever the caller
//! asks for it; there are no timers. An empty filter result yields a result
//! with `value: None`, never a zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::{
    adherence_rate, average, dose_progress, next_dose, symptom_frequency, trend_summary,
    DoseProgress, Fraction, SymptomCount, TrendSummary,
};
use crate::model::{
    Appointment, AppointmentStatus, Dose, MetricType, Permission, Reading, SymptomLog,
};
use crate::query::{
    bucket_by_period, category_in, filter_by_predicate, status_is, within, Bucket, Period,
    Query, TimeWindow,
};
use crate::store::EntityStore;
use crate::{MetricsConfig, MetricsError};

/// What the presentation layer wants to show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewRequest {
    /// Adherence of the doses scheduled today.
    TodaysDoses,
    DoseProgress,
    NextDose,
    MedicationAdherence {
        medication_id: String,
        period: Period,
    },
    VitalTrend {
        metric: MetricType,
        period: Period,
    },
    VitalAverage {
        metric: MetricType,
        period: Period,
    },
    VitalBuckets {
        metric: MetricType,
        period: Period,
    },
    ReadingsCount {
        period: Period,
    },
    UpcomingAppointments,
    UnreadMessages,
    ActiveCaregivers,
    CaregiversWithPermission {
        permission: Permission,
    },
    ConnectedDevices,
    ActiveMedications,
    SymptomFrequency {
        period: Period,
    },
    AverageMood {
        period: Period,
    },
}

impl ViewRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ViewRequest::TodaysDoses => "todays_doses",
            ViewRequest::DoseProgress => "dose_progress",
            ViewRequest::NextDose => "next_dose",
            ViewRequest::MedicationAdherence { .. } => "medication_adherence",
            ViewRequest::VitalTrend { .. } => "vital_trend",
            ViewRequest::VitalAverage { .. } => "vital_average",
            ViewRequest::VitalBuckets { .. } => "vital_buckets",
            ViewRequest::ReadingsCount { .. } => "readings_count",
            ViewRequest::UpcomingAppointments => "upcoming_appointments",
            ViewRequest::UnreadMessages => "unread_messages",
            ViewRequest::ActiveCaregivers => "active_caregivers",
            ViewRequest::CaregiversWithPermission { .. } => "caregivers_with_permission",
            ViewRequest::ConnectedDevices => "connected_devices",
            ViewRequest::ActiveMedications => "active_medications",
            ViewRequest::SymptomFrequency { .. } => "symptom_frequency",
            ViewRequest::AverageMood { .. } => "average_mood",
        }
    }

    /// Stat cards on the dashboard.
    pub fn dashboard() -> Vec<ViewRequest> {
        vec![
            ViewRequest::UpcomingAppointments,
            ViewRequest::DoseProgress,
            ViewRequest::UnreadMessages,
            ViewRequest::ReadingsCount {
                period: Period::Today,
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ViewValue {
    Rate(Fraction),
    Progress(DoseProgress),
    Number(f64),
    Count(usize),
    Trend(TrendSummary),
    Buckets(Vec<Bucket>),
    Dose(Dose),
    Appointments(Vec<Appointment>),
    Symptoms(Vec<SymptomCount>),
}

impl ViewValue {
    /// Scalar reading of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ViewValue::Rate(fraction) => Some(fraction.value()),
            ViewValue::Number(number) => Some(*number),
            ViewValue::Count(count) => Some(*count as f64),
            ViewValue::Trend(trend) => Some(trend.latest),
            _ => None,
        }
    }
}

/// Evaluated view. `value` is `None` when there was nothing to aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewResult {
    pub request: ViewRequest,
    pub value: Option<ViewValue>,
    pub as_of: DateTime<Utc>,
    pub window_description: String,
}

impl ViewResult {
    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }
}

/// Evaluates view requests against a store.
pub struct ViewEngine<'a, S: ?Sized> {
    store: &'a S,
    config: &'a MetricsConfig,
}

impl<'a, S> ViewEngine<'a, S>
where
    S: EntityStore + ?Sized,
{
    pub fn new(store: &'a S, config: &'a MetricsConfig) -> Self {
        Self { store, config }
    }

    pub fn evaluate(
        &self,
        request: &ViewRequest,
        now: DateTime<Utc>,
    ) -> Result<ViewResult, MetricsError> {
        debug!(view = request.name(), %now, "evaluating view");

        let (value, window_description) = match request {
            ViewRequest::TodaysDoses => {
                let doses = self.todays_doses(now);
                (
                    adherence_rate(&doses).map(ViewValue::Rate),
                    Period::Today.description().to_string(),
                )
            }
            ViewRequest::DoseProgress => {
                let doses = self.todays_doses(now);
                let value = if doses.is_empty() {
                    None
                } else {
                    Some(ViewValue::Progress(dose_progress(&doses)))
                };
                (value, Period::Today.description().to_string())
            }
            ViewRequest::NextDose => {
                let doses = self.todays_doses(now);
                (
                    next_dose(&doses, now).cloned().map(ViewValue::Dose),
                    Period::Today.description().to_string(),
                )
            }
            ViewRequest::MedicationAdherence {
                medication_id,
                period,
            } => {
                let window = self.window(*period, now);
                let query: Query<'_, Dose> = Query::new()
                    .and(|dose: &Dose| dose.medication_id == *medication_id)
                    .and(within::<Dose>(window));
                let doses = query.apply(&self.store.doses());
                (
                    adherence_rate(&doses).map(ViewValue::Rate),
                    period.description().to_string(),
                )
            }
            ViewRequest::VitalTrend { metric, period } => {
                let values = self.vital_values(*metric, self.window(*period, now));
                let range = self.config.normal_ranges.for_metric(*metric);
                (
                    trend_summary(&values, range)?.map(ViewValue::Trend),
                    period.description().to_string(),
                )
            }
            ViewRequest::VitalAverage { metric, period } => {
                let values = self.vital_values(*metric, self.window(*period, now));
                (
                    average(&values).map(ViewValue::Number),
                    period.description().to_string(),
                )
            }
            ViewRequest::VitalBuckets { metric, period } => {
                let window = self.window(*period, now);
                let readings = self.readings_for(*metric, window);
                let value = if readings.is_empty() {
                    None
                } else {
                    Some(ViewValue::Buckets(bucket_by_period(
                        &readings,
                        &window,
                        period.bucket_width(),
                        |reading| Some(reading.value.primary()),
                    )))
                };
                (value, period.description().to_string())
            }
            ViewRequest::ReadingsCount { period } => {
                let readings = filter_by_predicate(
                    &self.store.readings(),
                    within::<Reading>(self.window(*period, now)),
                );
                (count_value(readings.len()), period.description().to_string())
            }
            ViewRequest::UpcomingAppointments => {
                let days = self.config.upcoming_window_days;
                let query: Query<'_, Appointment> = Query::new()
                    .and(status_is::<Appointment>(AppointmentStatus::Upcoming))
                    .and(within::<Appointment>(TimeWindow::ahead(now, days)));
                let mut appointments = query.apply(&self.store.appointments());
                appointments.sort_by_key(|appointment| appointment.scheduled_at);
                let value = if appointments.is_empty() {
                    None
                } else {
                    Some(ViewValue::Appointments(appointments))
                };
                (value, format!("next {days} days"))
            }
            ViewRequest::UnreadMessages => {
                let unread = filter_by_predicate(&self.store.messages(), |message| message.unread);
                (count_value(unread.len()), "all messages".to_string())
            }
            ViewRequest::ActiveCaregivers => {
                let active =
                    filter_by_predicate(&self.store.family_members(), |member| member.is_active);
                (count_value(active.len()), "all caregivers".to_string())
            }
            ViewRequest::CaregiversWithPermission { permission } => {
                let members = filter_by_predicate(&self.store.family_members(), |member| {
                    member.is_active && member.has_permission(*permission)
                });
                (count_value(members.len()), "all caregivers".to_string())
            }
            ViewRequest::ConnectedDevices => {
                let connected = filter_by_predicate(&self.store.devices(), |device| device.connected);
                (count_value(connected.len()), "all devices".to_string())
            }
            ViewRequest::ActiveMedications => {
                let today = now.with_timezone(&self.config.offset()).date_naive();
                let active = filter_by_predicate(&self.store.medications(), |medication| {
                    medication.is_active_on(today)
                });
                (
                    count_value(active.len()),
                    Period::Today.description().to_string(),
                )
            }
            ViewRequest::SymptomFrequency { period } => {
                let logs = self.symptom_logs(*period, now);
                let value = if logs.is_empty() {
                    None
                } else {
                    Some(ViewValue::Symptoms(symptom_frequency(&logs)))
                };
                (value, period.description().to_string())
            }
            ViewRequest::AverageMood { period } => {
                let moods: Vec<f64> = self
                    .symptom_logs(*period, now)
                    .iter()
                    .map(|log| f64::from(log.mood.rating()))
                    .collect();
                (
                    average(&moods).map(ViewValue::Number),
                    period.description().to_string(),
                )
            }
        };

        if value.is_none() {
            debug!(view = request.name(), window = %window_description, "view has no data");
        }

        Ok(ViewResult {
            request: request.clone(),
            value,
            as_of: now,
            window_description,
        })
    }

    /// Evaluates a whole screen at the same instant.
    pub fn evaluate_all(
        &self,
        requests: &[ViewRequest],
        now: DateTime<Utc>,
    ) -> Result<Vec<ViewResult>, MetricsError> {
        requests
            .iter()
            .map(|request| self.evaluate(request, now))
            .collect()
    }

    fn window(&self, period: Period, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::for_period(period, now, self.config.offset())
    }

    fn todays_doses(&self, now: DateTime<Utc>) -> Vec<Dose> {
        filter_by_predicate(
            &self.store.doses(),
            within::<Dose>(self.window(Period::Today, now)),
        )
    }

    /// Readings of one metric inside `window`, oldest first.
    fn readings_for(&self, metric: MetricType, window: TimeWindow) -> Vec<Reading> {
        let query: Query<'_, Reading> = Query::new()
            .and(category_in::<Reading>(&[metric]))
            .and(within::<Reading>(window));
        let mut readings = query.apply(&self.store.readings());
        readings.sort_by_key(|reading| reading.timestamp);
        readings
    }

    fn vital_values(&self, metric: MetricType, window: TimeWindow) -> Vec<f64> {
        self.readings_for(metric, window)
            .iter()
            .map(|reading| reading.value.primary())
            .collect()
    }

    fn symptom_logs(&self, period: Period, now: DateTime<Utc>) -> Vec<SymptomLog> {
        filter_by_predicate(
            &self.store.symptom_logs(),
            within::<SymptomLog>(self.window(period, now)),
        )
    }
}

fn count_value(count: usize) -> Option<ViewValue> {
    (count > 0).then_some(ViewValue::Count(count))
}
