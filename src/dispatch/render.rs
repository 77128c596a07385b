//! Canonical JSON and human-readable rendering
//!
//! Every operation result is an [`Output`]. It renders to one JSON document
//! (sorted keys, RFC 3339 UTC timestamps with milliseconds) and to a short
//! text form for the terminal.

use crate::health::types::{
    ActivitySummary, AuthorizationStatus, DataType, HeartRateReading, QuantityWrite, Sample,
    Statistics, TimeInterval, TrendBucket, WorkoutRecord,
};
use crate::health::units::UnitDescriptor;
use crate::health::workouts::{display_name as activity_name, find as find_activity};
use crate::query::GroupBy;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::fmt::Write;

/// A rendered result: canonical JSON plus its text form
#[derive(Debug, Clone)]
pub struct Rendered {
    pub json: Value,
    pub text: String,
}

impl Rendered {
    /// Pretty-printed JSON document
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.json).unwrap_or_else(|_| self.json.to_string())
    }
}

/// Result of one operation, before rendering
#[derive(Debug)]
pub enum Output {
    Status {
        available: bool,
        backend: String,
        error: Option<String>,
        authorization: Vec<(&'static DataType, AuthorizationStatus)>,
    },
    Types(Vec<&'static DataType>),
    Authorized {
        read_only: bool,
        authorization: Vec<(&'static DataType, AuthorizationStatus)>,
    },
    Steps {
        interval: TimeInterval,
        steps: f64,
    },
    HeartRate {
        interval: TimeInterval,
        reading: HeartRateReading,
    },
    Workouts {
        interval: TimeInterval,
        workouts: Vec<WorkoutRecord>,
    },
    Activity {
        date: NaiveDate,
        summary: Option<ActivitySummary>,
    },
    Quantity {
        data_type: &'static DataType,
        interval: TimeInterval,
        unit: UnitDescriptor,
        samples: Vec<Sample>,
    },
    QuantitySaved {
        data_type: &'static DataType,
        value: f64,
        unit: UnitDescriptor,
        stored: QuantityWrite,
    },
    WorkoutSaved(WorkoutRecord),
    Stats {
        data_type: &'static DataType,
        interval: TimeInterval,
        stats: Statistics,
    },
    Trends {
        data_type: &'static DataType,
        interval: TimeInterval,
        group_by: GroupBy,
        unit: UnitDescriptor,
        buckets: Vec<TrendBucket>,
    },
}

/// RFC 3339 in UTC with millisecond precision
pub fn iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn authorization_json(authorization: &[(&'static DataType, AuthorizationStatus)]) -> Value {
    let map: Map<String, Value> = authorization
        .iter()
        .map(|(data_type, status)| (data_type.id.to_string(), json!(status.to_string())))
        .collect();
    Value::Object(map)
}

fn workout_json(workout: &WorkoutRecord) -> Value {
    json!({
        "activity": workout.activity,
        "calories": workout.energy_kcal,
        "distance": workout.distance_m,
        "durationMinutes": workout.duration_minutes(),
        "endDate": iso(workout.end),
        "source": workout.source,
        "startDate": iso(workout.start),
    })
}

fn summary_json(summary: &ActivitySummary) -> Value {
    json!({
        "activeEnergy": summary.active_energy_kcal,
        "activeEnergyGoal": summary.active_energy_goal_kcal,
        "exerciseMinutes": summary.exercise_minutes,
        "exerciseGoal": summary.exercise_goal_minutes,
        "standHours": summary.stand_hours,
        "standGoal": summary.stand_goal_hours,
    })
}

fn statistics_json(stats: &Statistics) -> Value {
    let mut map = Map::new();
    if let Some(sum) = stats.sum {
        map.insert("sum".to_string(), json!(sum));
    }
    if let Some(average) = stats.average {
        map.insert("average".to_string(), json!(average));
    }
    if let Some(minimum) = stats.minimum {
        map.insert("minimum".to_string(), json!(minimum));
    }
    if let Some(maximum) = stats.maximum {
        map.insert("maximum".to_string(), json!(maximum));
    }
    if let Some(recent) = stats.most_recent {
        map.insert(
            "mostRecent".to_string(),
            json!({"timestamp": iso(recent.timestamp), "value": recent.value}),
        );
    }
    map.insert("unit".to_string(), json!(stats.unit));
    Value::Object(map)
}

fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map(fmt_value).unwrap_or_else(|| "-".to_string())
}

fn local_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

impl Output {
    pub fn to_json(&self) -> Value {
        match self {
            Output::Status {
                available,
                backend,
                error,
                authorization,
            } => {
                let mut doc = json!({
                    "authorization": authorization_json(authorization),
                    "available": available,
                    "backend": backend,
                });
                if let (Some(error), Value::Object(map)) = (error, &mut doc) {
                    map.insert("error".to_string(), json!(error));
                }
                doc
            }
            Output::Types(types) => json!({
                "count": types.len(),
                "types": types
                    .iter()
                    .map(|t| json!({
                        "aggregation": t.aggregation.to_string(),
                        "displayName": t.display_name,
                        "id": t.id,
                        "kind": t.kind.to_string(),
                        "readable": true,
                        "unit": t.default_unit.map(|u| u.token),
                        "writable": t.writable,
                    }))
                    .collect::<Vec<_>>(),
            }),
            Output::Authorized {
                read_only,
                authorization,
            } => json!({
                "authorization": authorization_json(authorization),
                "readOnly": read_only,
                "requested": authorization.len(),
            }),
            Output::Steps { interval, steps } => json!({
                "endDate": iso(interval.end),
                "startDate": iso(interval.start),
                "steps": steps.round() as i64,
            }),
            Output::HeartRate { interval, reading } => json!({
                "endDate": iso(interval.end),
                "heartRate": {
                    "average": reading.average,
                    "count": reading.count(),
                    "maximum": reading.maximum,
                    "minimum": reading.minimum,
                    "samples": reading
                        .samples
                        .iter()
                        .map(|s| json!({"bpm": s.bpm, "timestamp": iso(s.timestamp)}))
                        .collect::<Vec<_>>(),
                },
                "startDate": iso(interval.start),
            }),
            Output::Workouts { interval, workouts } => json!({
                "count": workouts.len(),
                "endDate": iso(interval.end),
                "startDate": iso(interval.start),
                "workouts": workouts.iter().map(workout_json).collect::<Vec<_>>(),
            }),
            Output::Activity { date, summary } => json!({
                "activitySummary": summary.as_ref().map(summary_json),
                "date": date.format("%Y-%m-%d").to_string(),
            }),
            Output::Quantity {
                data_type,
                interval,
                unit,
                samples,
            } => json!({
                "count": samples.len(),
                "endDate": iso(interval.end),
                "samples": samples
                    .iter()
                    .map(|s| json!({"timestamp": iso(s.timestamp), "unit": s.unit, "value": s.value}))
                    .collect::<Vec<_>>(),
                "startDate": iso(interval.start),
                "type": data_type.id,
                "unit": unit.token,
            }),
            Output::QuantitySaved {
                data_type,
                value,
                unit,
                stored,
            } => json!({
                "date": iso(stored.start),
                "saved": true,
                "type": data_type.id,
                "unit": unit.token,
                "value": value,
            }),
            Output::WorkoutSaved(workout) => {
                let mut doc = workout_json(workout);
                if let Value::Object(map) = &mut doc {
                    map.insert("saved".to_string(), json!(true));
                    map.insert(
                        "activityType".to_string(),
                        json!(find_activity(&workout.activity).map(|a| a.store_identifier)),
                    );
                }
                doc
            }
            Output::Stats {
                data_type,
                interval,
                stats,
            } => json!({
                "endDate": iso(interval.end),
                "startDate": iso(interval.start),
                "statistics": statistics_json(stats),
                "type": data_type.id,
            }),
            Output::Trends {
                data_type,
                interval,
                group_by,
                unit,
                buckets,
            } => json!({
                "buckets": buckets
                    .iter()
                    .map(|b| json!({
                        "average": b.average,
                        "count": b.count,
                        "max": b.max,
                        "min": b.min,
                        "period": b.period,
                        "sum": b.sum,
                    }))
                    .collect::<Vec<_>>(),
                "endDate": iso(interval.end),
                "interval": group_by.to_string(),
                "startDate": iso(interval.start),
                "type": data_type.id,
                "unit": unit.token,
            }),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_text(&mut out);
        out.trim_end().to_string()
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        match self {
            Output::Status {
                available,
                backend,
                error,
                authorization,
            } => {
                writeln!(out, "Backend:   {}", backend)?;
                writeln!(out, "Available: {}", if *available { "yes" } else { "no" })?;
                if let Some(error) = error {
                    writeln!(out, "Error:     {}", error)?;
                }
                if !authorization.is_empty() {
                    writeln!(out)?;
                    for (data_type, status) in authorization {
                        writeln!(out, "  {:<28} {}", data_type.id, status)?;
                    }
                }
            }
            Output::Types(types) => {
                writeln!(
                    out,
                    "{:<28} {:<28} {:<10} {:<10} {:<11} {}",
                    "ID", "NAME", "KIND", "UNIT", "MODE", "WRITABLE"
                )?;
                for t in types {
                    writeln!(
                        out,
                        "{:<28} {:<28} {:<10} {:<10} {:<11} {}",
                        t.id,
                        t.display_name,
                        t.kind,
                        t.default_unit.map(|u| u.token).unwrap_or("-"),
                        t.aggregation,
                        if t.writable { "yes" } else { "no" }
                    )?;
                }
            }
            Output::Authorized {
                read_only,
                authorization,
            } => {
                writeln!(
                    out,
                    "Requested {} access for {} types",
                    if *read_only { "read-only" } else { "read/write" },
                    authorization.len()
                )?;
                for (data_type, status) in authorization {
                    writeln!(out, "  {:<28} {}", data_type.id, status)?;
                }
            }
            Output::Steps { interval, steps } => {
                writeln!(
                    out,
                    "{} steps between {} and {}",
                    steps.round() as i64,
                    local_time(interval.start),
                    local_time(interval.end)
                )?;
            }
            Output::HeartRate { reading, .. } => {
                if reading.count() == 0 {
                    writeln!(out, "No heart rate samples")?;
                } else {
                    writeln!(
                        out,
                        "Heart rate: avg {} / min {} / max {} bpm ({} samples)",
                        fmt_optional(reading.average),
                        fmt_optional(reading.minimum),
                        fmt_optional(reading.maximum),
                        reading.count()
                    )?;
                    for sample in &reading.samples {
                        writeln!(out, "  {}  {} bpm", local_time(sample.timestamp), fmt_value(sample.bpm))?;
                    }
                }
            }
            Output::Workouts { workouts, .. } => {
                if workouts.is_empty() {
                    writeln!(out, "No workouts")?;
                }
                for w in workouts {
                    write!(
                        out,
                        "{}  {:<20} {} min",
                        local_time(w.start),
                        activity_name(&w.activity),
                        fmt_value(w.duration_minutes().round())
                    )?;
                    if let Some(kcal) = w.energy_kcal {
                        write!(out, "  {} kcal", fmt_value(kcal))?;
                    }
                    if let Some(meters) = w.distance_m {
                        write!(out, "  {:.2} km", meters / 1000.0)?;
                    }
                    writeln!(out)?;
                }
            }
            Output::Activity { date, summary } => match summary {
                Some(s) => {
                    writeln!(out, "Activity for {}", date)?;
                    writeln!(
                        out,
                        "  Move:     {} / {} kcal",
                        fmt_value(s.active_energy_kcal),
                        fmt_value(s.active_energy_goal_kcal)
                    )?;
                    writeln!(
                        out,
                        "  Exercise: {} / {} min",
                        fmt_value(s.exercise_minutes),
                        fmt_value(s.exercise_goal_minutes)
                    )?;
                    writeln!(
                        out,
                        "  Stand:    {} / {} h",
                        fmt_value(s.stand_hours),
                        fmt_value(s.stand_goal_hours)
                    )?;
                }
                None => writeln!(out, "No activity summary for {}", date)?,
            },
            Output::Quantity {
                data_type, samples, ..
            } => {
                if samples.is_empty() {
                    writeln!(out, "No {} samples", data_type.display_name)?;
                }
                for s in samples {
                    writeln!(out, "{}  {} {}", local_time(s.timestamp), fmt_value(s.value), s.unit)?;
                }
            }
            Output::QuantitySaved {
                data_type,
                value,
                unit,
                stored,
            } => {
                writeln!(
                    out,
                    "Saved {} {} {} at {}",
                    data_type.display_name,
                    fmt_value(*value),
                    unit.token,
                    local_time(stored.start)
                )?;
            }
            Output::WorkoutSaved(w) => {
                writeln!(
                    out,
                    "Saved {} workout, {} min starting {}",
                    activity_name(&w.activity),
                    fmt_value(w.duration_minutes().round()),
                    local_time(w.start)
                )?;
            }
            Output::Stats {
                data_type, stats, ..
            } => {
                writeln!(out, "{} ({})", data_type.display_name, stats.unit)?;
                if let Some(sum) = stats.sum {
                    writeln!(out, "  Total:   {}", fmt_value(sum))?;
                }
                if stats.sum.is_none() {
                    writeln!(out, "  Average: {}", fmt_optional(stats.average))?;
                    writeln!(out, "  Minimum: {}", fmt_optional(stats.minimum))?;
                    writeln!(out, "  Maximum: {}", fmt_optional(stats.maximum))?;
                    if let Some(recent) = stats.most_recent {
                        writeln!(
                            out,
                            "  Latest:  {} at {}",
                            fmt_value(recent.value),
                            local_time(recent.timestamp)
                        )?;
                    }
                }
            }
            Output::Trends {
                data_type,
                group_by,
                unit,
                buckets,
                ..
            } => {
                writeln!(out, "{} by {} ({})", data_type.display_name, group_by, unit.token)?;
                if buckets.is_empty() {
                    writeln!(out, "  No samples")?;
                }
                for b in buckets {
                    writeln!(
                        out,
                        "  {:<12} n={:<5} sum={:<10} avg={:<8} min={:<8} max={}",
                        b.period,
                        b.count,
                        fmt_value(b.sum),
                        fmt_value(b.average),
                        fmt_value(b.min),
                        fmt_value(b.max)
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn render(self) -> Rendered {
        Rendered {
            json: self.to_json(),
            text: self.to_text(),
        }
    }
}
