//! Query and aggregation
//!
//! - **engine**: sums, samples, statistics and trends over a [`HealthStore`](crate::store::HealthStore)
//! - **trends**: client-side bucketing by day, ISO week or month

pub mod engine;
pub mod trends;

pub use engine::{QueryEngine, DEFAULT_SAMPLE_LIMIT, DEFAULT_WORKOUT_LIMIT};
pub use trends::{bucketize, GroupBy};
