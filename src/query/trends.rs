//! Client-side trend bucketing
//!
//! Samples are grouped by local calendar day, ISO week or calendar month.
//! Period keys are zero-padded so lexicographic order is chronological.

use crate::error::{HealthError, HealthResult};
use crate::health::types::TrendBucket;
use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grouping period for trends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Day,
    /// ISO week, starting Monday
    Week,
    Month,
}

impl GroupBy {
    /// Parse an interval name; unknown names are an `interval` argument error
    pub fn parse(s: &str) -> HealthResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(GroupBy::Day),
            "week" => Ok(GroupBy::Week),
            "month" => Ok(GroupBy::Month),
            _ => Err(HealthError::invalid(
                "interval",
                format!("unknown interval '{}' (expected day, week or month)", s),
            )),
        }
    }

    /// Period key for a timestamp, in the local time zone
    pub fn period_key(&self, timestamp: DateTime<Utc>) -> String {
        let local = timestamp.with_timezone(&Local);
        match self {
            GroupBy::Day => local.format("%Y-%m-%d").to_string(),
            GroupBy::Week => {
                let week = local.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            GroupBy::Month => local.format("%Y-%m").to_string(),
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupBy::Day => write!(f, "day"),
            GroupBy::Week => write!(f, "week"),
            GroupBy::Month => write!(f, "month"),
        }
    }
}

/// Group `(timestamp, value)` pairs into buckets ordered by period key
///
/// Periods with no samples produce no bucket.
pub fn bucketize(points: &[(DateTime<Utc>, f64)], group_by: GroupBy) -> Vec<TrendBucket> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (timestamp, value) in points {
        groups
            .entry(group_by.period_key(*timestamp))
            .or_default()
            .push(*value);
    }

    groups
        .into_iter()
        .map(|(period, values)| {
            let sum: f64 = values.iter().sum();
            TrendBucket {
                period,
                count: values.len(),
                sum,
                average: sum / values.len() as f64,
                min: values.iter().cloned().fold(f64::INFINITY, f64::min),
                max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}
