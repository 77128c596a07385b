//! Core data types shared by the registry, the store and the query engine
//!
//! - `DataType`: one entry of the canonical type vocabulary
//! - `TimeInterval`: a resolved query window
//! - `RawSample` / `RawStatistics`: what the store hands back
//! - `Sample`, `Statistics`, `TrendBucket`, `HeartRateReading`: what the engine produces
//! - `WorkoutRecord`, `ActivitySummary`: composite records
//! - `StoreWrite`: everything the store can be asked to save

use crate::health::units::UnitDescriptor;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Shape of the data behind a type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Numeric samples with a unit
    Quantity,
    /// Enumerated samples without a unit (sleep stages)
    Category,
    /// Records assembled from several values (workouts, activity rings)
    Composite,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Quantity => write!(f, "quantity"),
            DataKind::Category => write!(f, "category"),
            DataKind::Composite => write!(f, "composite"),
        }
    }
}

/// How statistics over a period are computed for a type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Summed over the period (steps, energy, distance)
    Cumulative,
    /// Averaged, min'd and max'd over the period (heart rate, weight)
    Discrete,
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMode::Cumulative => write!(f, "cumulative"),
            AggregationMode::Discrete => write!(f, "discrete"),
        }
    }
}

/// One entry of the data type registry
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    /// Canonical id, stable across versions (e.g. "steps", "heart_rate")
    pub id: &'static str,
    /// Platform sample identifier; absent for composite types
    pub store_identifier: Option<&'static str>,
    /// Unit values are stored and reported in unless overridden
    pub default_unit: Option<UnitDescriptor>,
    /// Human-readable name
    pub display_name: &'static str,
    pub kind: DataKind,
    pub aggregation: AggregationMode,
    /// Whether the type can be written at all
    pub writable: bool,
}

impl DataType {
    /// Types written through the generic quantity path
    pub fn is_quantity(&self) -> bool {
        self.kind == DataKind::Quantity
    }

    pub fn is_cumulative(&self) -> bool {
        self.aggregation == AggregationMode::Cumulative
    }
}

/// A resolved query window (`end` is not required to follow `start`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Check if a timestamp falls within the window, both ends inclusive
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Sort direction for sample queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Per-type authorization state reported by the store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "notDetermined"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Authorized => write!(f, "authorized"),
        }
    }
}

/// A quantity sample as held by the store, value in the type's default unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSample {
    pub value: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Device or app that recorded the sample
    pub source: Option<String>,
}

impl RawSample {
    /// A point-in-time sample
    pub fn at(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            start: timestamp,
            end: timestamp,
            source: None,
        }
    }

    /// Builder: set the recording source
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A sample as reported to callers, in the requested unit
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// Latest value in a statistics window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MostRecent {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Partial statistics as returned by the store, default unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatistics {
    pub sum: Option<f64>,
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub most_recent: Option<MostRecent>,
}

/// Statistics for one type over one window, in the requested unit
///
/// Cumulative types populate only `sum`; discrete types populate everything but `sum`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub sum: Option<f64>,
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub most_recent: Option<MostRecent>,
    pub unit: String,
}

/// Aggregates for one grouping period
#[derive(Debug, Clone, PartialEq)]
pub struct TrendBucket {
    /// Zero-padded period key ("2024-03-05", "2024-W10", "2024-03")
    pub period: String,
    pub count: usize,
    pub sum: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// One heart rate measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartRateSample {
    pub bpm: f64,
    pub timestamp: DateTime<Utc>,
}

/// Heart rate samples with summary figures over the returned samples
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeartRateReading {
    pub samples: Vec<HeartRateSample>,
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl HeartRateReading {
    pub fn from_samples(samples: Vec<HeartRateSample>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let values: Vec<f64> = samples.iter().map(|s| s.bpm).collect();
        let average = values.iter().sum::<f64>() / values.len() as f64;
        let minimum = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let maximum = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            samples,
            average: Some(average),
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

/// A workout session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRecord {
    /// Activity token from the workout vocabulary ("running", "cycling", ...)
    pub activity: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Active energy in kcal
    pub energy_kcal: Option<f64>,
    /// Distance in meters
    pub distance_m: Option<f64>,
    pub source: Option<String>,
}

impl WorkoutRecord {
    pub fn new(activity: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            activity: activity.into(),
            start,
            end,
            energy_kcal: None,
            distance_m: None,
            source: None,
        }
    }

    /// Builder: set burned energy
    pub fn energy(mut self, kcal: f64) -> Self {
        self.energy_kcal = Some(kcal);
        self
    }

    /// Builder: set distance
    pub fn distance(mut self, meters: f64) -> Self {
        self.distance_m = Some(meters);
        self
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 60_000.0
    }
}

/// Daily activity rings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivitySummary {
    pub date: NaiveDate,
    pub active_energy_kcal: f64,
    pub active_energy_goal_kcal: f64,
    pub exercise_minutes: f64,
    pub exercise_goal_minutes: f64,
    pub stand_hours: f64,
    pub stand_goal_hours: f64,
}

/// A quantity sample to be saved, value in the type's default unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuantityWrite {
    pub type_id: String,
    pub store_identifier: String,
    pub value: f64,
    pub unit: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Anything the store can persist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StoreWrite {
    Quantity(QuantityWrite),
    Workout(WorkoutRecord),
}
