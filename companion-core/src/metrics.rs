//! Derived values computed from ordered readings and doses.
//!
//! Every function here is pure: same input, same output, no clock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Dose, DoseStatus, SymptomLog};
use crate::MetricsError;

/// Exact ratio kept as counts so callers can show "3 of 5" as well as 60%.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fraction {
    pub numerator: usize,
    pub denominator: usize,
}

impl Fraction {
    pub fn new(numerator: usize, denominator: usize) -> Result<Self, MetricsError> {
        if denominator == 0 {
            return Err(MetricsError::DivisionUndefined);
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn value(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// Share of resolved doses that were taken.
///
/// Pending doses are ignored. Returns `None` when no dose is taken or missed,
/// so an empty schedule never reads as 0% adherence.
pub fn adherence_rate(doses: &[Dose]) -> Option<Fraction> {
    let (taken, resolved) = doses
        .iter()
        .filter(|dose| dose.status.is_resolved())
        .fold((0usize, 0usize), |(taken, resolved), dose| {
            (taken + usize::from(dose.status == DoseStatus::Taken), resolved + 1)
        });
    Fraction::new(taken, resolved).ok()
}

/// `(latest - previous) / previous * 100`. A zero `previous` or a result
/// that overflows to infinity is `DivisionUndefined`.
pub fn percent_change(latest: f64, previous: f64) -> Result<f64, MetricsError> {
    if previous == 0.0 {
        return Err(MetricsError::DivisionUndefined);
    }
    let percent = (latest - previous) / previous * 100.0;
    if !percent.is_finite() {
        return Err(MetricsError::DivisionUndefined);
    }
    Ok(percent)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Ties are always stable.
pub fn trend_direction(latest: f64, previous: f64) -> TrendDirection {
    if latest > previous {
        TrendDirection::Increasing
    } else if latest < previous {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Inclusive bounds of a normal value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NormalRange {
    pub min: f64,
    pub max: f64,
}

impl NormalRange {
    pub fn new(min: f64, max: f64) -> Result<Self, MetricsError> {
        let range = Self { min, max };
        range.check()?;
        Ok(range)
    }

    fn check(&self) -> Result<(), MetricsError> {
        if self.min > self.max {
            return Err(MetricsError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    Normal,
    Abnormal,
}

/// Bounds are inclusive; a reversed range is an error, never swapped.
pub fn normal_range_status(value: f64, range: &NormalRange) -> Result<RangeStatus, MetricsError> {
    range.check()?;
    if range.min <= value && value <= range.max {
        Ok(RangeStatus::Normal)
    } else {
        Ok(RangeStatus::Abnormal)
    }
}

/// "3 of 5 doses taken".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoseProgress {
    pub taken: usize,
    pub total: usize,
}

pub fn dose_progress(doses: &[Dose]) -> DoseProgress {
    DoseProgress {
        taken: doses
            .iter()
            .filter(|dose| dose.status == DoseStatus::Taken)
            .count(),
        total: doses.len(),
    }
}

/// Earliest pending dose scheduled at or after `now`.
pub fn next_dose(doses: &[Dose], now: DateTime<Utc>) -> Option<&Dose> {
    doses
        .iter()
        .filter(|dose| dose.status == DoseStatus::Pending && dose.scheduled_time >= now)
        .min_by_key(|dose| dose.scheduled_time)
}

/// Insight card values for a chronological series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSummary {
    pub latest: f64,
    pub previous: Option<f64>,
    pub change: Option<f64>,
    /// Absent when there is no previous value or it is zero.
    pub percent_change: Option<f64>,
    pub direction: TrendDirection,
    pub average: f64,
    pub range_status: RangeStatus,
    pub sample_count: usize,
}

/// Summarizes `values` (oldest first). `Ok(None)` for an empty series.
pub fn trend_summary(
    values: &[f64],
    range: &NormalRange,
) -> Result<Option<TrendSummary>, MetricsError> {
    let Some((&latest, rest)) = values.split_last() else {
        return Ok(None);
    };
    let range_status = normal_range_status(latest, range)?;
    let previous = rest.last().copied();

    let percent = match previous {
        Some(previous) => match percent_change(latest, previous) {
            Ok(percent) => Some(percent),
            Err(MetricsError::DivisionUndefined) => {
                tracing::debug!(latest, "previous value is zero, percent change undefined");
                None
            }
            Err(err) => return Err(err),
        },
        None => None,
    };

    Ok(Some(TrendSummary {
        latest,
        previous,
        change: previous.map(|previous| latest - previous),
        percent_change: percent,
        direction: previous
            .map(|previous| trend_direction(latest, previous))
            .unwrap_or(TrendDirection::Stable),
        average: average(values).ok_or(MetricsError::EmptyInput)?,
        range_status,
        sample_count: values.len(),
    }))
}

/// Self-reported mood on a 1..=10 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub struct MoodScore(u8);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoodBand {
    Low,
    Fair,
    Okay,
    Good,
}

impl MoodScore {
    pub fn new(rating: u8) -> Result<Self, MetricsError> {
        if (1..=10).contains(&rating) {
            Ok(Self(rating))
        } else {
            Err(MetricsError::InvalidMood(rating))
        }
    }

    pub fn rating(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Terrible",
            2 => "Very Bad",
            3 => "Bad",
            4 => "Poor",
            5 => "Fair",
            6 => "Okay",
            7 => "Good",
            8 => "Very Good",
            9 => "Great",
            _ => "Excellent",
        }
    }

    pub fn band(self) -> MoodBand {
        match self.0 {
            0..=3 => MoodBand::Low,
            4..=5 => MoodBand::Fair,
            6..=7 => MoodBand::Okay,
            _ => MoodBand::Good,
        }
    }
}

impl TryFrom<u8> for MoodScore {
    type Error = MetricsError;

    fn try_from(rating: u8) -> Result<Self, Self::Error> {
        MoodScore::new(rating)
    }
}

impl From<MoodScore> for u8 {
    fn from(score: MoodScore) -> Self {
        score.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymptomCount {
    pub name: String,
    pub count: usize,
}

/// How often each symptom was reported, most frequent first, ties by name.
pub fn symptom_frequency(logs: &[SymptomLog]) -> Vec<SymptomCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for log in logs {
        for symptom in &log.symptoms {
            *counts.entry(symptom.as_str()).or_insert(0) += 1;
        }
    }

    let mut frequency: Vec<SymptomCount> = counts
        .into_iter()
        .map(|(name, count)| SymptomCount {
            name: name.to_string(),
            count,
        })
        .collect();
    frequency.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    frequency
}
