//! Health data vocabulary
//!
//! The pure, store-independent layer shared by every front end:
//!
//! - **types**: data model (DataType, TimeInterval, samples, statistics, workouts)
//! - **registry**: canonical type ids mapped to store identifiers and units
//! - **dates**: relative and absolute date expressions
//! - **units**: unit tokens and same-dimension conversion
//! - **workouts**: workout activity vocabulary

pub mod dates;
pub mod registry;
pub mod types;
pub mod units;
pub mod workouts;

pub use dates::{parse_instant, parse_instant_at, parse_range, parse_range_at, DateParseError};
pub use registry::{registry, DataTypeRegistry};
pub use types::{
    ActivitySummary, AggregationMode, AuthorizationStatus, DataKind, DataType, HeartRateReading,
    HeartRateSample, MostRecent, QuantityWrite, RawSample, RawStatistics, Sample, SortOrder,
    Statistics, StoreWrite, TimeInterval, TrendBucket, WorkoutRecord,
};
pub use units::{Dimension, UnitDescriptor, UnitError};
pub use workouts::WorkoutActivity;
