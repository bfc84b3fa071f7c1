// tally-core/src/domain/metrics/calculator.rs
//
// Exact aggregation of transaction records into KPI sets.
// Sums are `Decimal`, so merging partial results in any order is exact and
// the parallel path is bit-identical to the sequential one.

use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use crate::domain::metrics::kpi::{DimensionKey, KpiSet};
use crate::domain::metrics::period::{Bucket, TimeBucket};
use crate::domain::metrics::rounding::ratio;
use crate::domain::record::{Dimension, TransactionRecord};

const PARALLEL_CHUNK: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq)]
struct Accumulator {
    sales: Decimal,
    profit: Decimal,
    discount: Decimal,
    lines: u64,
    orders: BTreeSet<String>,
    loss_orders: BTreeSet<String>,
}

// Record amounts are bounded by `MAX_AMOUNT`, so these sums stay far below `Decimal::MAX`.
impl Accumulator {
    fn add(&mut self, record: &TransactionRecord) {
        self.sales += record.sales();
        self.profit += record.profit();
        self.discount += record.discount();
        self.lines += 1;
        if !self.orders.contains(record.order_id()) {
            self.orders.insert(record.order_id().to_string());
        }
        if record.profit() < Decimal::ZERO && !self.loss_orders.contains(record.order_id()) {
            self.loss_orders.insert(record.order_id().to_string());
        }
    }

    fn merge(&mut self, other: Accumulator) {
        self.sales += other.sales;
        self.profit += other.profit;
        self.discount += other.discount;
        self.lines += other.lines;
        self.orders.extend(other.orders);
        self.loss_orders.extend(other.loss_orders);
    }

    fn finish(self, key: DimensionKey, bucket: Bucket, places: u32) -> KpiSet {
        KpiSet {
            key,
            bucket,
            total_sales: self.sales.normalize(),
            total_profit: self.profit.normalize(),
            order_count: self.orders.len() as u64,
            line_count: self.lines,
            loss_order_count: self.loss_orders.len() as u64,
            avg_discount: ratio(self.discount, Decimal::from(self.lines), places)
                .unwrap_or(Decimal::ZERO),
            profit_margin: ratio(self.profit, self.sales, places),
        }
    }
}

/// Streaming KPI aggregation.
///
/// For dimensions `[d1, .., dn]` every record lands in the top-level group and
/// in each prefix level `(d1)`, `(d1, d2)`, .. `(d1..dn)`. With a time bucket,
/// each of those groups also exists per period next to the `all` bucket.
#[derive(Debug, Clone)]
pub struct MetricCalculator {
    dimensions: Vec<Dimension>,
    time_bucket: TimeBucket,
    rounding_places: u32,
    groups: BTreeMap<(DimensionKey, Bucket), Accumulator>,
}

impl MetricCalculator {
    /// Repeated dimensions are ignored after their first occurrence.
    pub fn new(dimensions: &[Dimension], time_bucket: TimeBucket, rounding_places: u32) -> Self {
        let mut unique = Vec::with_capacity(dimensions.len());
        for d in dimensions {
            if !unique.contains(d) {
                unique.push(*d);
            }
        }
        Self {
            dimensions: unique,
            time_bucket,
            rounding_places,
            groups: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, record: &TransactionRecord) {
        let period = self.time_bucket.period_of(record.order_date());
        let mut key = DimensionKey::top_level();

        for depth in 0..=self.dimensions.len() {
            if depth > 0 {
                let dimension = self.dimensions[depth - 1];
                key = key.child(dimension, record.attribute(dimension));
            }
            self.groups
                .entry((key.clone(), Bucket::All))
                .or_default()
                .add(record);
            if let Some(p) = period {
                self.groups
                    .entry((key.clone(), Bucket::Period(p)))
                    .or_default()
                    .add(record);
            }
        }
    }

    /// Folds another calculator's partial groups into this one.
    pub fn merge(&mut self, other: MetricCalculator) {
        debug_assert_eq!(self.dimensions, other.dimensions);
        debug_assert_eq!(self.time_bucket, other.time_bucket);
        for (group, acc) in other.groups {
            self.groups.entry(group).or_default().merge(acc);
        }
    }

    /// KPI sets ordered by (key, bucket).
    pub fn finish(self) -> Vec<KpiSet> {
        let places = self.rounding_places;
        self.groups
            .into_iter()
            .map(|((key, bucket), acc)| acc.finish(key, bucket, places))
            .collect()
    }
}

/// Sequential reference computation.
#[instrument(skip(records), fields(dimensions = ?dimensions))]
pub fn compute<'a, I>(
    records: I,
    dimensions: &[Dimension],
    time_bucket: TimeBucket,
    rounding_places: u32,
) -> Vec<KpiSet>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut calculator = MetricCalculator::new(dimensions, time_bucket, rounding_places);
    for record in records {
        calculator.push(record);
    }
    let sets = calculator.finish();
    debug!(kpi_sets = sets.len(), "KPI sets computed");
    sets
}

/// Chunked aggregation on the rayon pool, merged by summation.
#[instrument(skip(records), fields(records = records.len(), dimensions = ?dimensions))]
pub fn compute_parallel(
    records: &[TransactionRecord],
    dimensions: &[Dimension],
    time_bucket: TimeBucket,
    rounding_places: u32,
) -> Vec<KpiSet> {
    let empty = || MetricCalculator::new(dimensions, time_bucket, rounding_places);
    records
        .par_chunks(PARALLEL_CHUNK)
        .fold(empty, |mut calculator, chunk| {
            for record in chunk {
                calculator.push(record);
            }
            calculator
        })
        .reduce(empty, |mut left, right| {
            left.merge(right);
            left
        })
        .finish()
}

/// Rounded margin for a single record, `None` when its sales are zero.
pub fn record_margin(record: &TransactionRecord, places: u32) -> Option<Decimal> {
    ratio(record.profit(), record.sales(), places)
}

/// Unrounded sum of `total_sales` over a collection of sets, used to check partitions.
pub fn sum_sales<'a, I: IntoIterator<Item = &'a KpiSet>>(sets: I) -> Decimal {
    sets.into_iter().map(|s| s.total_sales).sum()
}
