//! Dispatch router
//!
//! The single entry point both front ends call. A request is checked in a
//! fixed order before anything touches the store:
//!
//! 1. unknown operation name → `NotFound`
//! 2. missing required argument → `InvalidParams`
//! 3. argument fails its grammar (date, type id, unit, number) → `InvalidParams`
//!
//! Only then is the store opened and asked whether it is available.

use crate::dispatch::args::{resolve_type, ArgMap, Args};
use crate::dispatch::operations::{self, Operation, OperationKind, Surface};
use crate::dispatch::render::{Output, Rendered};
use crate::error::{HealthError, HealthResult};
use crate::health::registry::registry;
use crate::health::types::{AuthorizationStatus, DataType, WorkoutRecord};
use crate::health::workouts;
use crate::query::{GroupBy, QueryEngine};
use crate::store::{HealthStore, StoreHandle};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::debug;

/// Routes named operations to the engine and renders the results
pub struct Router {
    store: StoreHandle,
}

impl Router {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Dispatch against the current wall clock
    pub async fn dispatch(
        &self,
        surface: Surface,
        name: &str,
        args: &ArgMap,
    ) -> HealthResult<Rendered> {
        self.dispatch_at(surface, name, args, Local::now()).await
    }

    /// Dispatch with every date in the request resolved against `now`
    pub async fn dispatch_at(
        &self,
        surface: Surface,
        name: &str,
        args: &ArgMap,
        now: DateTime<Local>,
    ) -> HealthResult<Rendered> {
        let op = operations::find(name).ok_or_else(|| HealthError::NotFound(name.to_string()))?;
        debug!(operation = op.name, %surface, "Dispatching");

        let args = Args::new(op, surface, args, now);
        if let Some(missing) = args.missing_required() {
            return Err(HealthError::invalid(missing, "missing required argument"));
        }

        let output = self.execute(op, &args).await?;
        Ok(output.render())
    }

    /// Open the store and require it to be available
    async fn engine(&self) -> HealthResult<QueryEngine> {
        let store = self.store.get().await?;
        if !store.is_available().await {
            return Err(HealthError::NotAvailable);
        }
        Ok(QueryEngine::new(store))
    }

    async fn execute(&self, op: &'static Operation, args: &Args<'_>) -> HealthResult<Output> {
        match op.kind {
            OperationKind::Status => self.status().await,

            OperationKind::ListTypes => Ok(Output::Types(registry().iter().collect())),

            OperationKind::Authorize => {
                let read_only = args.flag("read_only")?;
                let requested = args.list("types")?;
                let read: Vec<&'static DataType> = if requested.is_empty() {
                    registry().all_readable()
                } else {
                    requested
                        .iter()
                        .map(|id| resolve_type("types", id))
                        .collect::<HealthResult<_>>()?
                };
                let write: Vec<&'static DataType> = if read_only {
                    Vec::new()
                } else {
                    read.iter().copied().filter(|t| t.writable).collect()
                };

                let engine = self.engine().await?;
                let store = engine.store();
                store.request_authorization(&read, &write).await?;
                Ok(Output::Authorized {
                    read_only,
                    authorization: statuses(store, &read).await,
                })
            }

            OperationKind::ReadSteps => {
                let interval = args.interval()?;
                let steps_type = builtin("steps")?;
                let engine = self.engine().await?;
                let steps = engine.sum(steps_type, interval).await?;
                Ok(Output::Steps { interval, steps })
            }

            OperationKind::ReadHeartRate => {
                let interval = args.interval()?;
                let limit = args.limit()?;
                let engine = self.engine().await?;
                let reading = engine.heart_rate(interval, limit).await?;
                Ok(Output::HeartRate { interval, reading })
            }

            OperationKind::ReadWorkouts => {
                let interval = args.interval()?;
                let limit = args.limit()?;
                let activity = match args.string("activity")? {
                    Some(token) => Some(activity_token(&token)?),
                    None => None,
                };
                let engine = self.engine().await?;
                let workouts = engine.workouts(interval, activity, limit).await?;
                Ok(Output::Workouts { interval, workouts })
            }

            OperationKind::ReadActivity => {
                let date = args.date("date")?;
                let engine = self.engine().await?;
                let summary = engine.activity_summary(date).await?;
                Ok(Output::Activity { date, summary })
            }

            OperationKind::ReadQuantity => {
                let data_type = quantity_type(args)?;
                let interval = args.interval()?;
                let unit = args.unit(data_type)?;
                let limit = args.limit()?;
                let engine = self.engine().await?;
                let samples = engine.samples(data_type, interval, unit, limit).await?;
                Ok(Output::Quantity {
                    data_type,
                    interval,
                    unit,
                    samples,
                })
            }

            OperationKind::WriteQuantity => {
                let data_type = quantity_type(args)?;
                if !data_type.writable {
                    return Err(HealthError::TypeNotAvailable(data_type.id.to_string()));
                }
                let value = args
                    .amount("value")?
                    .ok_or_else(|| HealthError::invalid("value", "missing required argument"))?;
                let unit = args.unit(data_type)?;
                let at = args.required_instant("date")?;

                let engine = self.engine().await?;
                let stored = engine.save_quantity(data_type, value, unit, at).await?;
                Ok(Output::QuantitySaved {
                    data_type,
                    value,
                    unit,
                    stored,
                })
            }

            OperationKind::WriteWorkout => {
                let activity = activity_token(&args.required_string("activity")?)?;
                let start = args.required_instant("start")?;
                let end = args.required_instant("end")?;
                if end <= start {
                    return Err(HealthError::invalid("end", "end must be after start"));
                }

                let mut workout = WorkoutRecord::new(activity, start, end);
                if let Some(kcal) = args.amount("calories")? {
                    workout = workout.energy(kcal);
                }
                if let Some(meters) = args.amount("distance")? {
                    workout = workout.distance(meters);
                }

                let engine = self.engine().await?;
                let saved = engine.save_workout(workout).await?;
                Ok(Output::WorkoutSaved(saved))
            }

            OperationKind::QueryStats => {
                let data_type = quantity_type(args)?;
                let interval = args.interval()?;
                let unit = args.unit(data_type)?;
                let engine = self.engine().await?;
                let stats = engine.statistics(data_type, interval, unit).await?;
                Ok(Output::Stats {
                    data_type,
                    interval,
                    stats,
                })
            }

            OperationKind::QueryTrends => {
                let data_type = quantity_type(args)?;
                let interval = args.interval()?;
                let group_by = GroupBy::parse(&args.required_string("interval")?)?;
                let unit = args.unit(data_type)?;
                let engine = self.engine().await?;
                let buckets = engine.trends(data_type, interval, group_by, unit).await?;
                Ok(Output::Trends {
                    data_type,
                    interval,
                    group_by,
                    unit,
                    buckets,
                })
            }
        }
    }

    /// Status never fails on the store itself; open errors are reported inline
    async fn status(&self) -> HealthResult<Output> {
        let store = match self.store.get().await {
            Ok(store) => store,
            Err(e) => {
                return Ok(Output::Status {
                    available: false,
                    backend: "none".to_string(),
                    error: Some(e.to_string()),
                    authorization: Vec::new(),
                })
            }
        };

        let available = store.is_available().await;
        let authorization = if available {
            statuses(&store, &registry().all_readable()).await
        } else {
            Vec::new()
        };
        Ok(Output::Status {
            available,
            backend: store.backend().to_string(),
            error: None,
            authorization,
        })
    }
}

async fn statuses(
    store: &Arc<dyn HealthStore>,
    types: &[&'static DataType],
) -> Vec<(&'static DataType, AuthorizationStatus)> {
    let mut out = Vec::with_capacity(types.len());
    for &data_type in types {
        out.push((data_type, store.authorization_status(data_type).await));
    }
    out
}

fn builtin(id: &str) -> HealthResult<&'static DataType> {
    registry()
        .resolve(id)
        .ok_or_else(|| HealthError::TypeNotAvailable(id.to_string()))
}

/// The `type` argument, which must name a quantity type
fn quantity_type(args: &Args<'_>) -> HealthResult<&'static DataType> {
    let data_type = args.data_type()?;
    if !data_type.is_quantity() {
        return Err(HealthError::TypeNotAvailable(format!(
            "{} is not a quantity type",
            data_type.id
        )));
    }
    Ok(data_type)
}

fn activity_token(token: &str) -> HealthResult<&'static str> {
    workouts::find(token).map(|a| a.token).ok_or_else(|| {
        HealthError::invalid("activity", format!("unknown workout activity '{}'", token))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::{ActivitySummary, RawSample, StoreWrite};
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use serde_json::{json, Value};

    const STEPS: &str = "HKQuantityTypeIdentifierStepCount";
    const HEART_RATE: &str = "HKQuantityTypeIdentifierHeartRate";

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap()
    }

    fn args(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn router(store: MemoryStore) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(store);
        (Router::new(StoreHandle::from_store(store.clone())), store)
    }

    fn parse_iso(value: &Value) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value.as_str().unwrap())
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_read_steps_end_to_end() {
        let sample_time = now().with_timezone(&Utc) - Duration::days(2);
        let store = MemoryStore::new().with_sample(STEPS, RawSample::at(12345.0, sample_time));
        let (router, _) = router(store);

        let rendered = router
            .dispatch_at(
                Surface::Cli,
                "health_read_steps",
                &args(json!({"from": "7d", "to": "now"})),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(rendered.json["steps"], json!(12345));
        let keys: Vec<_> = rendered.json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["endDate", "startDate", "steps"]);

        let start = parse_iso(&rendered.json["startDate"]);
        let end = parse_iso(&rendered.json["endDate"]);
        assert_eq!(end - start, Duration::days(7));
    }

    #[tokio::test]
    async fn test_read_steps_wall_clock() {
        let sample_time = Utc::now() - Duration::hours(3);
        let store = MemoryStore::new().with_sample(STEPS, RawSample::at(12345.0, sample_time));
        let (router, _) = router(store);

        let rendered = router
            .dispatch(Surface::Protocol, "health_read_steps", &ArgMap::new())
            .await
            .unwrap();
        assert_eq!(rendered.json["steps"], json!(12345));

        let start = parse_iso(&rendered.json["startDate"]);
        let end = parse_iso(&rendered.json["endDate"]);
        let gap = end - start;
        assert!((gap - Duration::days(7)).num_seconds().abs() <= 1);
    }

    #[tokio::test]
    async fn test_steps_defaults_differ_by_surface() {
        let sample_time = now().with_timezone(&Utc) - Duration::days(3);
        let store = MemoryStore::new().with_sample(STEPS, RawSample::at(800.0, sample_time));
        let (router, _) = router(store);

        let cli = router
            .dispatch_at(Surface::Cli, "health_read_steps", &ArgMap::new(), now())
            .await
            .unwrap();
        let protocol = router
            .dispatch_at(Surface::Protocol, "health_read_steps", &ArgMap::new(), now())
            .await
            .unwrap();

        assert_eq!(cli.json["steps"], json!(0));
        assert_eq!(protocol.json["steps"], json!(800));
    }

    #[tokio::test]
    async fn test_write_quantity_weight_default_unit() {
        let (router, store) = router(MemoryStore::new());

        let rendered = router
            .dispatch_at(
                Surface::Cli,
                "health_write_quantity",
                &args(json!({"type": "weight", "value": "75.5"})),
                now(),
            )
            .await
            .unwrap();
        assert_eq!(rendered.json["saved"], json!(true));
        assert_eq!(rendered.json["unit"], json!("kg"));

        let writes = store.writes().await;
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            StoreWrite::Quantity(q) => {
                assert_eq!(q.value, 75.5);
                assert_eq!(q.unit, "kg");
                assert_eq!(q.store_identifier, "HKQuantityTypeIdentifierBodyMass");
                assert_eq!(q.start, now().with_timezone(&Utc));
            }
            other => panic!("unexpected write {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_workout_equal_times_rejected_without_store_call() {
        let (router, store) = router(MemoryStore::new());

        let err = router
            .dispatch_at(
                Surface::Cli,
                "health_write_workout",
                &args(json!({
                    "activity": "running",
                    "start": "2024-03-14T07:00:00Z",
                    "end": "2024-03-14T07:00:00Z",
                })),
                now(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_PARAMS");
        assert_eq!(err.field(), Some("end"));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_workout_saves() {
        let (router, store) = router(MemoryStore::new());

        let rendered = router
            .dispatch_at(
                Surface::Protocol,
                "health_write_workout",
                &args(json!({
                    "activity": "Strength-Training",
                    "start": "2024-03-14T07:00:00Z",
                    "end": "2024-03-14T07:45:00Z",
                    "calories": 310,
                })),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(rendered.json["activity"], json!("strength_training"));
        assert_eq!(rendered.json["durationMinutes"], json!(45.0));
        assert_eq!(store.writes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let (router, _) = router(MemoryStore::new());
        let err = router
            .dispatch_at(Surface::Protocol, "health_read_everything", &ArgMap::new(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_required_names_argument() {
        let (router, _) = router(MemoryStore::new());

        let err = router
            .dispatch_at(Surface::Protocol, "health_query_stats", &ArgMap::new(), now())
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("type"));

        let err = router
            .dispatch_at(
                Surface::Protocol,
                "health_write_quantity",
                &args(json!({"type": "weight"})),
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("value"));
    }

    #[tokio::test]
    async fn test_grammar_errors_carry_field() {
        let (router, _) = router(MemoryStore::new());

        let cases = [
            ("health_read_steps", json!({"from": "soon"}), "from"),
            ("health_read_quantity", json!({"type": "weigth"}), "type"),
            ("health_read_quantity", json!({"type": "weight", "unit": "bpm"}), "unit"),
            ("health_query_trends", json!({"type": "steps", "interval": "hour"}), "interval"),
            ("health_read_workouts", json!({"activity": "quidditch"}), "activity"),
            ("health_write_quantity", json!({"type": "weight", "value": -2}), "value"),
        ];

        for (name, raw, field) in cases {
            let err = router
                .dispatch_at(Surface::Protocol, name, &args(raw), now())
                .await
                .unwrap_err();
            assert_eq!(err.field(), Some(field), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_non_quantity_type_not_available() {
        let (router, store) = router(MemoryStore::new());

        for id in ["sleep", "workouts", "activity_summary"] {
            let err = router
                .dispatch_at(
                    Surface::Cli,
                    "health_write_quantity",
                    &args(json!({"type": id, "value": "1"})),
                    now(),
                )
                .await
                .unwrap_err();
            assert_eq!(err.code(), "TYPE_NOT_AVAILABLE", "{}", id);
        }
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let (router, _) = router(MemoryStore::unavailable());

        let err = router
            .dispatch_at(Surface::Cli, "health_read_steps", &ArgMap::new(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::NotAvailable));

        // Grammar errors still win over availability
        let err = router
            .dispatch_at(Surface::Cli, "health_read_steps", &args(json!({"to": "x"})), now())
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("to"));

        let status = router
            .dispatch_at(Surface::Cli, "health_status", &ArgMap::new(), now())
            .await
            .unwrap();
        assert_eq!(status.json["available"], json!(false));
    }

    #[tokio::test]
    async fn test_query_stats_mode_policy() {
        let t = now().with_timezone(&Utc) - Duration::days(1);
        let (router, _) = router(
            MemoryStore::new()
                .with_sample(STEPS, RawSample::at(3000.0, t))
                .with_sample(HEART_RATE, RawSample::at(64.0, t))
                .with_sample(HEART_RATE, RawSample::at(72.0, t + Duration::hours(1))),
        );

        let steps = router
            .dispatch_at(Surface::Cli, "health_query_stats", &args(json!({"type": "steps"})), now())
            .await
            .unwrap();
        let stats = steps.json["statistics"].as_object().unwrap();
        assert_eq!(stats.keys().cloned().collect::<Vec<_>>(), vec!["sum", "unit"]);
        assert_eq!(stats["sum"], json!(3000.0));

        let hr = router
            .dispatch_at(
                Surface::Cli,
                "health_query_stats",
                &args(json!({"type": "heart_rate"})),
                now(),
            )
            .await
            .unwrap();
        let stats = hr.json["statistics"].as_object().unwrap();
        assert!(!stats.contains_key("sum"));
        assert_eq!(stats["average"], json!(68.0));
        assert_eq!(stats["mostRecent"]["value"], json!(72.0));
    }

    #[tokio::test]
    async fn test_query_trends_three_days() {
        let noon = |d: u32| {
            Local
                .with_ymd_and_hms(2024, 3, d, 12, 0, 0)
                .unwrap()
                .with_timezone(&Utc)
        };
        let (router, _) = router(
            MemoryStore::new()
                .with_sample(STEPS, RawSample::at(100.0, noon(10)))
                .with_sample(STEPS, RawSample::at(200.0, noon(11)))
                .with_sample(STEPS, RawSample::at(300.0, noon(11) + Duration::hours(2)))
                .with_sample(STEPS, RawSample::at(400.0, noon(13))),
        );

        let rendered = router
            .dispatch_at(
                Surface::Protocol,
                "health_query_trends",
                &args(json!({"type": "steps", "from": "7d"})),
                now(),
            )
            .await
            .unwrap();

        let buckets = rendered.json["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0]["period"], json!("2024-03-10"));
        assert_eq!(buckets[1]["count"], json!(2));
        assert_eq!(buckets[1]["sum"], json!(500.0));
        assert_eq!(buckets[2]["period"], json!("2024-03-13"));
        assert_eq!(rendered.json["interval"], json!("day"));
    }

    #[tokio::test]
    async fn test_authorize_and_status() {
        let heart_rate = registry().resolve("heart_rate").unwrap();
        let (router, _) = router(MemoryStore::new().deny(heart_rate));

        let rendered = router
            .dispatch_at(
                Surface::Cli,
                "health_authorize",
                &args(json!({"types": "steps,heart_rate", "read_only": "true"})),
                now(),
            )
            .await
            .unwrap();
        assert_eq!(rendered.json["authorization"]["steps"], json!("authorized"));
        assert_eq!(rendered.json["authorization"]["heart_rate"], json!("denied"));
        assert_eq!(rendered.json["readOnly"], json!(true));

        let status = router
            .dispatch_at(Surface::Cli, "health_status", &ArgMap::new(), now())
            .await
            .unwrap();
        assert_eq!(status.json["available"], json!(true));
        assert_eq!(status.json["backend"], json!("memory"));
        assert_eq!(status.json["authorization"]["weight"], json!("notDetermined"));

        let err = router
            .dispatch_at(Surface::Cli, "health_read_heart_rate", &ArgMap::new(), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_read_activity_empty_is_not_error() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let (router, _) = router(MemoryStore::new().with_activity_summary(ActivitySummary {
            date,
            active_energy_kcal: 420.0,
            active_energy_goal_kcal: 500.0,
            exercise_minutes: 25.0,
            exercise_goal_minutes: 30.0,
            stand_hours: 9.0,
            stand_goal_hours: 12.0,
        }));

        let today = router
            .dispatch_at(Surface::Cli, "health_read_activity", &ArgMap::new(), now())
            .await
            .unwrap();
        assert_eq!(today.json["activitySummary"], Value::Null);
        assert_eq!(today.json["date"], json!("2024-03-15"));

        let yesterday = router
            .dispatch_at(
                Surface::Cli,
                "health_read_activity",
                &args(json!({"date": "2024-03-14"})),
                now(),
            )
            .await
            .unwrap();
        assert_eq!(yesterday.json["activitySummary"]["activeEnergy"], json!(420.0));
    }

    #[tokio::test]
    async fn test_open_failure_surfaces_per_request() {
        use crate::config::{StoreBackend, StoreConfig, SyncMode};

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let router = Router::new(StoreHandle::new(StoreConfig {
            backend: StoreBackend::Journal,
            data_dir: blocker.to_string_lossy().to_string(),
            sync: SyncMode::None,
        }));

        let err = router
            .dispatch_at(Surface::Protocol, "health_read_steps", &ArgMap::new(), now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORE_FAILURE");

        let status = router
            .dispatch_at(Surface::Protocol, "health_status", &ArgMap::new(), now())
            .await
            .unwrap();
        assert_eq!(status.json["available"], json!(false));
        assert!(status.json["error"].is_string());
    }
}
