//! Query/aggregation engine
//!
//! Resolves a data type and window into store calls and shapes the results:
//!
//! ```text
//! sum         → native cumulative sum, 0 when empty
//! samples     → newest first, capped at DEFAULT_SAMPLE_LIMIT
//! statistics  → fields chosen by the type's aggregation mode
//! trends      → one ascending fetch, bucketed client-side
//! ```
//!
//! Store values are in each type's default unit; conversion to a requested
//! unit happens here. Store failures propagate unchanged, nothing is retried.

use crate::error::{HealthError, HealthResult};
use crate::health::registry::registry;
use crate::health::types::{
    ActivitySummary, AggregationMode, DataType, HeartRateReading, HeartRateSample, QuantityWrite,
    Sample, SortOrder, Statistics, StoreWrite, TimeInterval, TrendBucket, WorkoutRecord,
};
use crate::health::units::{self, UnitDescriptor};
use crate::query::trends::{bucketize, GroupBy};
use crate::store::HealthStore;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;

/// Sample cap for quantity and heart rate reads
pub const DEFAULT_SAMPLE_LIMIT: usize = 100;
/// Record cap for workout reads
pub const DEFAULT_WORKOUT_LIMIT: usize = 50;

/// Engine over a shared store
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn HealthStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn HealthStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn HealthStore> {
        &self.store
    }

    /// Sum of a cumulative quantity over the window, in the default unit
    pub async fn sum(&self, data_type: &DataType, interval: TimeInterval) -> HealthResult<f64> {
        let (identifier, _) = quantity_parts(data_type)?;
        let sum = self.store.query_cumulative_sum(identifier, interval).await?;
        Ok(sum.unwrap_or(0.0))
    }

    /// Samples newest first, converted to `unit`
    pub async fn samples(
        &self,
        data_type: &DataType,
        interval: TimeInterval,
        unit: UnitDescriptor,
        limit: Option<usize>,
    ) -> HealthResult<Vec<Sample>> {
        let (identifier, default_unit) = quantity_parts(data_type)?;
        let raw = self
            .store
            .query_samples(
                identifier,
                interval,
                Some(limit.unwrap_or(DEFAULT_SAMPLE_LIMIT)),
                SortOrder::Descending,
            )
            .await?;

        raw.into_iter()
            .map(|s| {
                Ok(Sample {
                    value: convert(s.value, default_unit, unit)?,
                    unit: unit.token.to_string(),
                    timestamp: s.start,
                })
            })
            .collect()
    }

    /// Heart rate samples newest first, with average, minimum and maximum over them
    pub async fn heart_rate(
        &self,
        interval: TimeInterval,
        limit: Option<usize>,
    ) -> HealthResult<HeartRateReading> {
        let heart_rate = registry()
            .resolve("heart_rate")
            .ok_or_else(|| HealthError::TypeNotAvailable("heart_rate".to_string()))?;
        let unit = heart_rate.default_unit.unwrap_or(units::BEATS_PER_MINUTE);

        let samples = self.samples(heart_rate, interval, unit, limit).await?;
        Ok(HeartRateReading::from_samples(
            samples
                .into_iter()
                .map(|s| HeartRateSample {
                    bpm: s.value,
                    timestamp: s.timestamp,
                })
                .collect(),
        ))
    }

    /// Statistics whose populated fields follow the type's aggregation mode
    ///
    /// Cumulative types get `sum` only (0 when empty); discrete types get
    /// average, minimum, maximum and most recent, never `sum`.
    pub async fn statistics(
        &self,
        data_type: &DataType,
        interval: TimeInterval,
        unit: UnitDescriptor,
    ) -> HealthResult<Statistics> {
        let (identifier, default_unit) = quantity_parts(data_type)?;
        let raw = self
            .store
            .query_statistics(identifier, interval, data_type.aggregation)
            .await?;

        let to_unit = |value: Option<f64>| -> HealthResult<Option<f64>> {
            value.map(|v| convert(v, default_unit, unit)).transpose()
        };

        let stats = match data_type.aggregation {
            AggregationMode::Cumulative => Statistics {
                sum: Some(to_unit(raw.sum)?.unwrap_or(0.0)),
                average: None,
                minimum: None,
                maximum: None,
                most_recent: None,
                unit: unit.token.to_string(),
            },
            AggregationMode::Discrete => Statistics {
                sum: None,
                average: to_unit(raw.average)?,
                minimum: to_unit(raw.minimum)?,
                maximum: to_unit(raw.maximum)?,
                most_recent: match raw.most_recent {
                    Some(mut recent) => {
                        recent.value = convert(recent.value, default_unit, unit)?;
                        Some(recent)
                    }
                    None => None,
                },
                unit: unit.token.to_string(),
            },
        };
        Ok(stats)
    }

    /// Trend buckets over the whole window, fetched once without a cap
    pub async fn trends(
        &self,
        data_type: &DataType,
        interval: TimeInterval,
        group_by: GroupBy,
        unit: UnitDescriptor,
    ) -> HealthResult<Vec<TrendBucket>> {
        let (identifier, default_unit) = quantity_parts(data_type)?;
        let raw = self
            .store
            .query_samples(identifier, interval, None, SortOrder::Ascending)
            .await?;
        debug!("Bucketing {} {} samples by {}", raw.len(), data_type.id, group_by);

        let points = raw
            .iter()
            .map(|s| Ok((s.start, convert(s.value, default_unit, unit)?)))
            .collect::<HealthResult<Vec<_>>>()?;
        Ok(bucketize(&points, group_by))
    }

    /// Workouts newest first, capped at DEFAULT_WORKOUT_LIMIT
    pub async fn workouts(
        &self,
        interval: TimeInterval,
        activity: Option<&str>,
        limit: Option<usize>,
    ) -> HealthResult<Vec<WorkoutRecord>> {
        let workouts = self
            .store
            .query_workouts(
                interval,
                activity,
                Some(limit.unwrap_or(DEFAULT_WORKOUT_LIMIT)),
            )
            .await?;
        Ok(workouts)
    }

    /// Activity rings for one day; `None` is a normal empty result
    pub async fn activity_summary(&self, date: NaiveDate) -> HealthResult<Option<ActivitySummary>> {
        Ok(self.store.query_activity_summary(date).await?)
    }

    /// Save one quantity sample given in `unit`, stored in the type's default unit
    pub async fn save_quantity(
        &self,
        data_type: &DataType,
        value: f64,
        unit: UnitDescriptor,
        at: DateTime<Utc>,
    ) -> HealthResult<QuantityWrite> {
        let (identifier, default_unit) = quantity_parts(data_type)?;
        if !data_type.writable {
            return Err(HealthError::TypeNotAvailable(data_type.id.to_string()));
        }

        let write = QuantityWrite {
            type_id: data_type.id.to_string(),
            store_identifier: identifier.to_string(),
            value: convert(value, unit, default_unit)?,
            unit: default_unit.token.to_string(),
            start: at,
            end: at,
        };
        self.store.save(StoreWrite::Quantity(write.clone())).await?;
        Ok(write)
    }

    pub async fn save_workout(&self, workout: WorkoutRecord) -> HealthResult<WorkoutRecord> {
        self.store.save(StoreWrite::Workout(workout.clone())).await?;
        Ok(workout)
    }
}

/// Sample identifier and default unit of a quantity type
fn quantity_parts(data_type: &DataType) -> HealthResult<(&'static str, UnitDescriptor)> {
    match (data_type.is_quantity(), data_type.store_identifier, data_type.default_unit) {
        (true, Some(identifier), Some(unit)) => Ok((identifier, unit)),
        _ => Err(HealthError::TypeNotAvailable(data_type.id.to_string())),
    }
}

fn convert(value: f64, from: UnitDescriptor, to: UnitDescriptor) -> HealthResult<f64> {
    units::convert(value, from, to).map_err(|e| HealthError::invalid("unit", e.to_string()))
}
