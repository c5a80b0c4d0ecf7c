//! Predicate filtering and time windows over entity collections.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Months, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::average;
use crate::model::{
    AccessLevel, Appointment, AppointmentKind, AppointmentStatus, Dose, DoseStatus, FamilyMember,
    HealthDevice, Message, MetricType, Reading, SymptomLog,
};

/// Entities that can be placed on a timeline.
pub trait Timestamped {
    fn timestamp(&self) -> Option<DateTime<Utc>>;
}

/// Entities with a status used for filtering.
pub trait HasStatus {
    type Status: Copy + PartialEq;

    fn status(&self) -> Self::Status;
}

/// Entities with a category used for filtering.
pub trait Categorized {
    type Category: Copy + Eq + Hash;

    fn category(&self) -> Self::Category;
}

/// Keeps the items matching `predicate`, in input order.
pub fn filter_by_predicate<T, P>(collection: &[T], predicate: P) -> Vec<T>
where
    T: Clone,
    P: Fn(&T) -> bool,
{
    collection
        .iter()
        .filter(|item| predicate(item))
        .cloned()
        .collect()
}

/// Conjunction of predicates. An empty query matches everything.
pub struct Query<'a, T> {
    predicates: Vec<Box<dyn Fn(&T) -> bool + 'a>>,
}

impl<'a, T> Query<'a, T> {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    pub fn and<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'a,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    pub fn matches(&self, item: &T) -> bool {
        self.predicates.iter().all(|predicate| predicate(item))
    }

    pub fn apply(&self, items: &[T]) -> Vec<T>
    where
        T: Clone,
    {
        filter_by_predicate(items, |item| self.matches(item))
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl<T> Default for Query<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Query<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

pub fn status_is<T: HasStatus>(status: T::Status) -> impl Fn(&T) -> bool {
    move |item| item.status() == status
}

pub fn category_in<T: Categorized>(selected: &[T::Category]) -> impl Fn(&T) -> bool {
    let selected: HashSet<T::Category> = selected.iter().copied().collect();
    move |item| selected.contains(&item.category())
}

/// Items without a timestamp never match.
pub fn within<T: Timestamped>(window: TimeWindow) -> impl Fn(&T) -> bool {
    move |item| item.timestamp().is_some_and(|ts| window.contains(ts))
}

/// Selectable reporting period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Period {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "3m")]
    Months3,
    #[serde(rename = "6m")]
    Months6,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Days7 => "7d",
            Period::Days30 => "30d",
            Period::Months3 => "3m",
            Period::Months6 => "6m",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Days7 => "last 7 days",
            Period::Days30 => "last 30 days",
            Period::Months3 => "last 3 months",
            Period::Months6 => "last 6 months",
        }
    }

    /// Width of one chart bucket.
    pub fn bucket_width(&self) -> Duration {
        match self {
            Period::Today | Period::Days7 => Duration::days(1),
            Period::Days30 => Duration::weeks(1),
            Period::Months3 | Period::Months6 => Duration::days(30),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(Period::Today),
            "7d" | "week" => Ok(Period::Days7),
            "30d" | "month" => Ok(Period::Days30),
            "3m" => Ok(Period::Months3),
            "6m" => Ok(Period::Months6),
            other => Err(format!("unknown period: {other}")),
        }
    }
}

/// Interval `[start, end)`, or `[start, end]` for windows ending at "now".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_inclusive: bool,
}

impl TimeWindow {
    /// Window for `period` relative to `now`. `today` is the calendar day
    /// containing `now` in `offset`; the others look back from `now`.
    pub fn for_period(period: Period, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        match period {
            Period::Today => Self::calendar_day(now, offset),
            Period::Days7 => Self::trailing(now, now - Duration::days(7)),
            Period::Days30 => Self::trailing(now, now - Duration::days(30)),
            Period::Months3 => Self::trailing(now, months_before(now, 3)),
            Period::Months6 => Self::trailing(now, months_before(now, 6)),
        }
    }

    pub fn calendar_day(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = now.with_timezone(&offset);
        let since_midnight = Duration::seconds(i64::from(local.num_seconds_from_midnight()))
            + Duration::nanoseconds(i64::from(local.nanosecond() % 1_000_000_000));
        let start = now - since_midnight;
        Self {
            start,
            end: start + Duration::days(1),
            end_inclusive: false,
        }
    }

    /// `[now, now + days]`.
    pub fn ahead(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now,
            end: now + Duration::days(i64::from(days)),
            end_inclusive: true,
        }
    }

    fn trailing(now: DateTime<Utc>, start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: now,
            end_inclusive: true,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start
            && if self.end_inclusive {
                instant <= self.end
            } else {
                instant < self.end
            }
    }
}

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or_else(|| now - Duration::days(30 * i64::from(months)))
}

/// Values grouped into one chart bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    pub count: usize,
    pub average: Option<f64>,
}

/// Splits `window` into consecutive buckets of `width` and averages the
/// values falling into each. Items outside the window, without a timestamp
/// or without a value are skipped. Empty buckets are kept with `average:
/// None` so charts keep their x axis.
pub fn bucket_by_period<T, F>(
    items: &[T],
    window: &TimeWindow,
    width: Duration,
    value_of: F,
) -> Vec<Bucket>
where
    T: Timestamped,
    F: Fn(&T) -> Option<f64>,
{
    let span = (window.end - window.start).num_seconds().max(1);
    let width_secs = width.num_seconds().max(1);
    let bucket_count = ((span + width_secs - 1) / width_secs) as usize;

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); bucket_count];
    for item in items {
        let Some(ts) = item.timestamp() else {
            continue;
        };
        if !window.contains(ts) {
            continue;
        }
        let Some(value) = value_of(item) else {
            continue;
        };
        let index = ((ts - window.start).num_seconds() / width_secs) as usize;
        values[index.min(bucket_count - 1)].push(value);
    }

    values
        .into_iter()
        .enumerate()
        .map(|(index, bucket)| Bucket {
            start: window.start + width * index as i32,
            count: bucket.len(),
            average: average(&bucket),
        })
        .collect()
}

impl Timestamped for Reading {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

impl Timestamped for Dose {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.scheduled_time)
    }
}

impl Timestamped for Appointment {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.scheduled_at)
    }
}

impl Timestamped for Message {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.sent_at)
    }
}

impl Timestamped for FamilyMember {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_access
    }
}

impl Timestamped for HealthDevice {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }
}

impl Timestamped for SymptomLog {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.logged_at)
    }
}

impl HasStatus for Dose {
    type Status = DoseStatus;

    fn status(&self) -> DoseStatus {
        self.status
    }
}

impl HasStatus for Appointment {
    type Status = AppointmentStatus;

    fn status(&self) -> AppointmentStatus {
        self.status
    }
}

impl Categorized for Reading {
    type Category = MetricType;

    fn category(&self) -> MetricType {
        self.metric_type
    }
}

impl Categorized for Appointment {
    type Category = AppointmentKind;

    fn category(&self) -> AppointmentKind {
        self.appointment_type
    }
}

impl Categorized for FamilyMember {
    type Category = AccessLevel;

    fn category(&self) -> AccessLevel {
        self.access_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReadingValue;
    use chrono::{Offset, TimeZone};

    fn reading(id: &str, metric_type: MetricType, value: f64, ts: DateTime<Utc>) -> Reading {
        Reading {
            id: id.to_string(),
            metric_type,
            value: ReadingValue::Scalar(value),
            unit: metric_type.default_unit().to_string(),
            timestamp: ts,
            source: "Manual Entry".to_string(),
            within_normal_range: true,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn filter_preserves_order_and_input() {
        let readings = vec![
            reading("1", MetricType::HeartRate, 72.0, at(14, 8)),
            reading("2", MetricType::Weight, 165.0, at(15, 8)),
            reading("3", MetricType::HeartRate, 68.0, at(16, 8)),
        ];
        let before = readings.clone();
        let heart = |r: &Reading| r.metric_type == MetricType::HeartRate;

        let first = filter_by_predicate(&readings, heart);
        let second = filter_by_predicate(&readings, heart);

        assert_eq!(first, second);
        assert_eq!(readings, before);
        let ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let readings = vec![reading("1", MetricType::HeartRate, 72.0, at(14, 8))];
        assert!(filter_by_predicate(&readings, |r: &Reading| r.value.primary() > 500.0).is_empty());
    }

    #[test]
    fn query_combines_with_and() {
        let readings = vec![
            reading("1", MetricType::HeartRate, 72.0, at(14, 8)),
            reading("2", MetricType::HeartRate, 68.0, at(19, 8)),
            reading("3", MetricType::Oxygen, 97.0, at(19, 9)),
        ];
        let window = TimeWindow::for_period(Period::Days7, at(20, 12), Utc.fix());

        let empty: Query<'_, Reading> = Query::new();
        assert!(empty.is_empty());
        assert_eq!(empty.apply(&readings), readings);

        let query: Query<'_, Reading> = Query::new()
            .and(category_in::<Reading>(&[MetricType::HeartRate]))
            .and(within::<Reading>(window));
        assert_eq!(query.len(), 2);
        let ids: Vec<String> = query.apply(&readings).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["2".to_string()]);
    }

    #[test]
    fn status_predicate() {
        let dose = Dose {
            id: "1".to_string(),
            medication_id: "m".to_string(),
            scheduled_time: at(20, 8),
            taken_time: None,
            status: DoseStatus::Missed,
        };
        assert!(status_is::<Dose>(DoseStatus::Missed)(&dose));
        assert!(!status_is::<Dose>(DoseStatus::Taken)(&dose));
    }

    #[test]
    fn today_follows_local_calendar_day() {
        let now = at(20, 2);
        let utc_day = TimeWindow::for_period(Period::Today, now, Utc.fix());
        assert_eq!(utc_day.start, at(20, 0));
        assert_eq!(utc_day.end, at(21, 0));
        assert!(utc_day.contains(at(20, 23)));
        assert!(!utc_day.contains(at(21, 0)));

        // 02:00 UTC is still the 19th five hours west of Greenwich.
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let local_day = TimeWindow::for_period(Period::Today, now, west);
        assert_eq!(local_day.start, at(19, 5));
        assert_eq!(local_day.end, at(20, 5));
    }

    #[test]
    fn trailing_windows_include_now() {
        let now = at(20, 12);
        let week = TimeWindow::for_period(Period::Days7, now, Utc.fix());
        assert!(week.contains(now));
        assert!(week.contains(at(13, 12)));
        assert!(!week.contains(at(13, 11)));
        assert!(!week.contains(at(20, 13)));

        let quarter = TimeWindow::for_period(Period::Months3, now, Utc.fix());
        assert_eq!(
            quarter.start,
            Utc.with_ymd_and_hms(2023, 10, 20, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn period_round_trips_through_str() {
        for period in [
            Period::Today,
            Period::Days7,
            Period::Days30,
            Period::Months3,
            Period::Months6,
        ] {
            assert_eq!(period.as_str().parse::<Period>(), Ok(period));
        }
        assert_eq!(
            serde_json::to_string(&Period::Days30).unwrap(),
            "\"30d\"".to_string()
        );
    }

    #[test]
    fn buckets_average_per_day() {
        let now = at(20, 12);
        let window = TimeWindow::for_period(Period::Days7, now, Utc.fix());
        let readings = vec![
            reading("1", MetricType::HeartRate, 70.0, at(13, 13)),
            reading("2", MetricType::HeartRate, 74.0, at(13, 20)),
            reading("3", MetricType::HeartRate, 80.0, now),
            reading("4", MetricType::HeartRate, 99.0, at(1, 0)),
        ];

        let buckets = bucket_by_period(&readings, &window, Period::Days7.bucket_width(), |r| {
            Some(r.value.primary())
        });

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].start, at(13, 12));
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].average, Some(72.0));
        assert_eq!(buckets[3].average, None);
        assert_eq!(buckets[6].count, 1);
        assert_eq!(buckets[6].average, Some(80.0));
    }
}
