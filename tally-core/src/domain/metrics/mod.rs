// tally-core/src/domain/metrics/mod.rs

pub mod calculator;
pub mod kpi;
pub mod period;
pub mod rounding;

pub use calculator::{MetricCalculator, compute, compute_parallel};
pub use kpi::{DimensionKey, KpiMetric, KpiSet, MetricValue};
pub use period::{Bucket, Period, TimeBucket};
pub use rounding::{DEFAULT_ROUNDING_PLACES, MAX_ROUNDING_PLACES, round_half_even};
