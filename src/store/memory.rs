//! In-process health store
//!
//! Holds samples, workouts and activity summaries in memory and answers every
//! [`HealthStore`] query over them. Values are kept in each type's default
//! unit. Every `save` is also appended to a write log so callers can inspect
//! write traffic.

use crate::health::types::{
    ActivitySummary, AggregationMode, AuthorizationStatus, DataType, MostRecent, RawSample,
    RawStatistics, SortOrder, StoreWrite, TimeInterval, WorkoutRecord,
};
use crate::store::{HealthStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// Authorization key for composite workout records
const WORKOUTS_KEY: &str = "workouts";
/// Authorization key for activity summaries
const ACTIVITY_KEY: &str = "activity_summary";

/// Source tag stamped on samples written through this store
pub const WRITE_SOURCE: &str = "healthbridge";

#[derive(Debug, Default)]
struct MemoryState {
    samples: HashMap<String, Vec<RawSample>>,
    workouts: Vec<WorkoutRecord>,
    summaries: BTreeMap<NaiveDate, ActivitySummary>,
    authorization: HashMap<String, AuthorizationStatus>,
    denied: HashSet<String>,
    writes: Vec<StoreWrite>,
}

impl MemoryState {
    fn check_access(&self, key: &str) -> StoreResult<()> {
        if self.denied.contains(key) {
            return Err(StoreError::AuthorizationDenied(key.to_string()));
        }
        Ok(())
    }

    fn samples_in(&self, identifier: &str, interval: TimeInterval) -> Vec<RawSample> {
        self.samples
            .get(identifier)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| interval.contains(s.start))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn apply(&mut self, write: StoreWrite) {
        match write {
            StoreWrite::Quantity(q) => {
                let sample = RawSample {
                    value: q.value,
                    start: q.start,
                    end: q.end,
                    source: Some(WRITE_SOURCE.to_string()),
                };
                self.samples.entry(q.store_identifier).or_default().push(sample);
            }
            StoreWrite::Workout(workout) => self.workouts.push(workout),
        }
    }
}

/// Authorization key for a type: its sample identifier, or its id for composites
fn access_key(data_type: &DataType) -> &'static str {
    data_type.store_identifier.unwrap_or(data_type.id)
}

fn write_key(write: &StoreWrite) -> &str {
    match write {
        StoreWrite::Quantity(q) => &q.store_identifier,
        StoreWrite::Workout(_) => WORKOUTS_KEY,
    }
}

/// In-memory [`HealthStore`]
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: true,
        }
    }

    /// A store that reports itself unavailable, as on an unsupported platform
    pub fn unavailable() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: false,
        }
    }

    /// Builder: seed a sample under a store identifier
    pub fn with_sample(mut self, identifier: &str, sample: RawSample) -> Self {
        self.state
            .get_mut()
            .samples
            .entry(identifier.to_string())
            .or_default()
            .push(sample);
        self
    }

    /// Builder: seed a workout
    pub fn with_workout(mut self, workout: WorkoutRecord) -> Self {
        self.state.get_mut().workouts.push(workout);
        self
    }

    /// Builder: seed an activity summary
    pub fn with_activity_summary(mut self, summary: ActivitySummary) -> Self {
        self.state.get_mut().summaries.insert(summary.date, summary);
        self
    }

    /// Builder: deny access to a type
    pub fn deny(mut self, data_type: &DataType) -> Self {
        self.state.get_mut().denied.insert(access_key(data_type).to_string());
        self
    }

    /// Apply a previously persisted write without recording it as new traffic
    pub(crate) fn restore(&mut self, write: StoreWrite) {
        self.state.get_mut().apply(write);
    }

    /// Every write accepted through `save`, oldest first
    pub async fn writes(&self) -> Vec<StoreWrite> {
        self.state.read().await.writes.clone()
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    fn backend(&self) -> &str {
        if self.available {
            "memory"
        } else {
            "unavailable"
        }
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn request_authorization(
        &self,
        read: &[&'static DataType],
        write: &[&'static DataType],
    ) -> StoreResult<()> {
        if !self.available {
            return Err(StoreError::Backend("health data is unavailable".to_string()));
        }

        let mut state = self.state.write().await;
        for data_type in read.iter().chain(write.iter()) {
            let key = access_key(data_type);
            if !state.denied.contains(key) {
                state
                    .authorization
                    .insert(key.to_string(), AuthorizationStatus::Authorized);
            }
        }
        Ok(())
    }

    async fn authorization_status(&self, data_type: &DataType) -> AuthorizationStatus {
        let state = self.state.read().await;
        let key = access_key(data_type);
        if state.denied.contains(key) {
            return AuthorizationStatus::Denied;
        }
        state
            .authorization
            .get(key)
            .copied()
            .unwrap_or(AuthorizationStatus::NotDetermined)
    }

    async fn query_cumulative_sum(
        &self,
        identifier: &str,
        interval: TimeInterval,
    ) -> StoreResult<Option<f64>> {
        let state = self.state.read().await;
        state.check_access(identifier)?;

        let samples = state.samples_in(identifier, interval);
        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(samples.iter().map(|s| s.value).sum()))
    }

    async fn query_samples(
        &self,
        identifier: &str,
        interval: TimeInterval,
        limit: Option<usize>,
        sort: SortOrder,
    ) -> StoreResult<Vec<RawSample>> {
        let state = self.state.read().await;
        state.check_access(identifier)?;

        let mut samples = state.samples_in(identifier, interval);
        match sort {
            SortOrder::Ascending => samples.sort_by_key(|s| s.start),
            SortOrder::Descending => samples.sort_by(|a, b| b.start.cmp(&a.start)),
        }
        if let Some(limit) = limit {
            samples.truncate(limit);
        }
        Ok(samples)
    }

    async fn query_statistics(
        &self,
        identifier: &str,
        interval: TimeInterval,
        mode: AggregationMode,
    ) -> StoreResult<RawStatistics> {
        let state = self.state.read().await;
        state.check_access(identifier)?;

        let samples = state.samples_in(identifier, interval);
        if samples.is_empty() {
            return Ok(RawStatistics::default());
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let stats = match mode {
            AggregationMode::Cumulative => RawStatistics {
                sum: Some(values.iter().sum()),
                ..RawStatistics::default()
            },
            AggregationMode::Discrete => {
                let latest = samples.iter().max_by_key(|s| s.end);
                RawStatistics {
                    sum: None,
                    average: Some(values.iter().sum::<f64>() / values.len() as f64),
                    minimum: values.iter().cloned().reduce(f64::min),
                    maximum: values.iter().cloned().reduce(f64::max),
                    most_recent: latest.map(|s| MostRecent {
                        value: s.value,
                        timestamp: s.end,
                    }),
                }
            }
        };
        Ok(stats)
    }

    async fn query_workouts(
        &self,
        interval: TimeInterval,
        activity: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<WorkoutRecord>> {
        let state = self.state.read().await;
        state.check_access(WORKOUTS_KEY)?;

        let mut workouts: Vec<WorkoutRecord> = state
            .workouts
            .iter()
            .filter(|w| interval.contains(w.start))
            .filter(|w| activity.map_or(true, |a| w.activity == a))
            .cloned()
            .collect();
        workouts.sort_by(|a, b| b.start.cmp(&a.start));
        if let Some(limit) = limit {
            workouts.truncate(limit);
        }
        Ok(workouts)
    }

    async fn query_activity_summary(&self, date: NaiveDate) -> StoreResult<Option<ActivitySummary>> {
        let state = self.state.read().await;
        state.check_access(ACTIVITY_KEY)?;
        Ok(state.summaries.get(&date).cloned())
    }

    async fn save(&self, write: StoreWrite) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check_access(write_key(&write))?;
        state.writes.push(write.clone());
        state.apply(write);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::registry::registry;
    use crate::health::types::QuantityWrite;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const STEPS: &str = "HKQuantityTypeIdentifierStepCount";
    const HEART_RATE: &str = "HKQuantityTypeIdentifierHeartRate";

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }

    fn day() -> TimeInterval {
        TimeInterval::new(t(0), t(23))
    }

    #[tokio::test]
    async fn test_cumulative_sum() {
        let store = MemoryStore::new()
            .with_sample(STEPS, RawSample::at(1000.0, t(8)))
            .with_sample(STEPS, RawSample::at(2500.0, t(12)))
            .with_sample(STEPS, RawSample::at(99999.0, t(0) - Duration::days(1)));

        let sum = store.query_cumulative_sum(STEPS, day()).await.unwrap();
        assert_eq!(sum, Some(3500.0));

        let empty = store.query_cumulative_sum(HEART_RATE, day()).await.unwrap();
        assert_eq!(empty, None);
    }

    #[tokio::test]
    async fn test_samples_sorted_and_limited() {
        let store = MemoryStore::new()
            .with_sample(HEART_RATE, RawSample::at(60.0, t(8)))
            .with_sample(HEART_RATE, RawSample::at(80.0, t(12)))
            .with_sample(HEART_RATE, RawSample::at(70.0, t(10)));

        let desc = store
            .query_samples(HEART_RATE, day(), Some(2), SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(desc.iter().map(|s| s.value).collect::<Vec<_>>(), vec![80.0, 70.0]);

        let asc = store
            .query_samples(HEART_RATE, day(), None, SortOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(
            asc.iter().map(|s| s.value).collect::<Vec<_>>(),
            vec![60.0, 70.0, 80.0]
        );
    }

    #[tokio::test]
    async fn test_statistics_by_mode() {
        let store = MemoryStore::new()
            .with_sample(HEART_RATE, RawSample::at(60.0, t(8)))
            .with_sample(HEART_RATE, RawSample::at(90.0, t(12)));

        let discrete = store
            .query_statistics(HEART_RATE, day(), AggregationMode::Discrete)
            .await
            .unwrap();
        assert_eq!(discrete.sum, None);
        assert_eq!(discrete.average, Some(75.0));
        assert_eq!(discrete.minimum, Some(60.0));
        assert_eq!(discrete.maximum, Some(90.0));
        assert_eq!(discrete.most_recent.unwrap().timestamp, t(12));

        let cumulative = store
            .query_statistics(HEART_RATE, day(), AggregationMode::Cumulative)
            .await
            .unwrap();
        assert_eq!(cumulative.sum, Some(150.0));
        assert!(cumulative.average.is_none());
    }

    #[tokio::test]
    async fn test_workout_filter() {
        let store = MemoryStore::new()
            .with_workout(WorkoutRecord::new("running", t(7), t(8)))
            .with_workout(WorkoutRecord::new("yoga", t(18), t(19)))
            .with_workout(WorkoutRecord::new("running", t(20), t(21)));

        let all = store.query_workouts(day(), None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].start, t(20));

        let running = store
            .query_workouts(day(), Some("running"), Some(1))
            .await
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].start, t(20));
    }

    #[tokio::test]
    async fn test_authorization_flow() {
        let heart_rate = registry().resolve("heart_rate").unwrap();
        let steps = registry().resolve("steps").unwrap();
        let store = MemoryStore::new().deny(heart_rate);

        assert_eq!(
            store.authorization_status(steps).await,
            AuthorizationStatus::NotDetermined
        );

        store.request_authorization(&[steps, heart_rate], &[]).await.unwrap();
        assert_eq!(
            store.authorization_status(steps).await,
            AuthorizationStatus::Authorized
        );
        assert_eq!(
            store.authorization_status(heart_rate).await,
            AuthorizationStatus::Denied
        );

        let err = store
            .query_samples(HEART_RATE, day(), None, SortOrder::Descending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AuthorizationDenied(_)));
    }

    #[tokio::test]
    async fn test_save_records_and_applies() {
        let store = MemoryStore::new();
        let write = StoreWrite::Quantity(QuantityWrite {
            type_id: "steps".to_string(),
            store_identifier: STEPS.to_string(),
            value: 500.0,
            unit: "count".to_string(),
            start: t(9),
            end: t(9),
        });

        store.save(write.clone()).await.unwrap();

        assert_eq!(store.writes().await, vec![write]);
        let sum = store.query_cumulative_sum(STEPS, day()).await.unwrap();
        assert_eq!(sum, Some(500.0));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MemoryStore::unavailable();
        assert!(!store.is_available().await);
        assert_eq!(store.backend(), "unavailable");
        assert!(store.request_authorization(&[], &[]).await.is_err());
    }
}
