// tally-core/src/domain/insights/health.rs
//
// Executive health summary: overall KPIs, a penalty-based health score, the
// worst performer per dimension and the structural loss risk across years.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

use crate::domain::metrics::{
    Bucket, KpiMetric, KpiSet, MetricValue, TimeBucket, compute, round_half_even,
};
use crate::domain::record::{Dimension, TransactionRecord};

/// Loss-order share tolerated before the health score is penalized, in percent.
const LOSS_PCT_ALLOWANCE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);
const MARGIN_PENALTY: Decimal = Decimal::from_parts(2, 0, 0, false, 0);
const LOSS_PENALTY: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

const STABLE_BELOW: Decimal = Decimal::from_parts(5, 0, 0, false, 2);
const MODERATE_BELOW: Decimal = Decimal::from_parts(15, 0, 0, false, 2);
const HIGH_RISK_ABOVE: Decimal = Decimal::from_parts(35, 0, 0, false, 2);
const MODERATE_RISK_ABOVE: Decimal = Decimal::from_parts(25, 0, 0, false, 2);

/// Dimensions searched for a worst performer.
pub const PERFORMER_DIMENSIONS: [Dimension; 4] = [
    Dimension::Category,
    Dimension::SubCategory,
    Dimension::Region,
    Dimension::Segment,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Moderate,
    Unstable,
}

impl Stability {
    fn classify(std_loss_ratio: Decimal) -> Self {
        if std_loss_ratio < STABLE_BELOW {
            Self::Stable
        } else if std_loss_ratio < MODERATE_BELOW {
            Self::Moderate
        } else {
            Self::Unstable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Severe,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High (Structural Inefficiency)",
            Self::Severe => "Severe (Structural Collapse Detected)",
        };
        f.write_str(label)
    }
}

/// Lowest-profit value of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorstPerformer {
    pub dimension: Dimension,
    pub value: String,
    pub total_profit: Decimal,
    pub profit_margin_pct: Option<Decimal>,
}

/// Loss behaviour of one dimension value across yearly periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRisk {
    pub value: String,
    pub periods: u64,
    pub loss_periods: u64,
    pub loss_consistency_ratio: Decimal,
    pub avg_loss_ratio: Decimal,
    pub std_loss_ratio: Decimal,
    pub stability: Stability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub dimension: Dimension,
    /// Highest average loss ratio first.
    pub segments: Vec<SegmentRisk>,
    pub risk_level: RiskLevel,
}

impl RiskProfile {
    pub fn highest(&self) -> Option<&SegmentRisk> {
        self.segments.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_revenue: Decimal,
    pub total_profit: Decimal,
    pub profit_margin_pct: Option<Decimal>,
    pub order_count: u64,
    pub loss_order_count: u64,
    pub loss_order_pct: Option<Decimal>,
    pub health_score: Decimal,
    pub worst_performers: Vec<WorstPerformer>,
    pub risk: RiskProfile,
}

impl HealthSummary {
    #[instrument(skip(records), fields(records = records.len()))]
    pub fn from_records(
        records: &[TransactionRecord],
        risk_dimension: Dimension,
        places: u32,
    ) -> Self {
        let overall = compute(records, &[], TimeBucket::None, places)
            .into_iter()
            .next();

        let (revenue, profit, orders, loss_orders) = overall
            .as_ref()
            .map(|s| (s.total_sales, s.total_profit, s.order_count, s.loss_order_count))
            .unwrap_or_default();

        let margin_pct = percent(profit, revenue);
        let loss_pct = percent(Decimal::from(loss_orders), Decimal::from(orders));

        Self {
            total_revenue: revenue,
            total_profit: profit,
            profit_margin_pct: margin_pct.map(|p| round_half_even(p, places)),
            order_count: orders,
            loss_order_count: loss_orders,
            loss_order_pct: loss_pct.map(|p| round_half_even(p, places)),
            health_score: round_half_even(health_score(margin_pct, loss_pct), places),
            worst_performers: worst_performers(records, places),
            risk: risk_profile(records, risk_dimension, places),
        }
    }

    /// Resolves a citable summary field such as `health_score`,
    /// `worst.region.total_profit` or `risk.Furniture.avg_loss_ratio`.
    pub fn metric(&self, field: &str) -> Option<MetricValue> {
        let value = |v: Decimal| Some(MetricValue::Value(v));
        match field {
            "total_revenue" | "total_sales" => value(self.total_revenue),
            "total_profit" => value(self.total_profit),
            "profit_margin_pct" => Some(MetricValue::from_option(self.profit_margin_pct)),
            "order_count" | "total_orders" => value(Decimal::from(self.order_count)),
            "loss_order_count" => value(Decimal::from(self.loss_order_count)),
            "loss_order_pct" => Some(MetricValue::from_option(self.loss_order_pct)),
            "health_score" => value(self.health_score),
            "highest_loss_ratio_pct" => self
                .risk
                .highest()
                .map(|s| MetricValue::Value((s.avg_loss_ratio * Decimal::ONE_HUNDRED).normalize())),
            _ => self.nested_metric(field),
        }
    }

    fn nested_metric(&self, field: &str) -> Option<MetricValue> {
        let (scope, rest) = field.split_once('.')?;
        let (name, metric) = rest.rsplit_once('.')?;
        match scope {
            "worst" => {
                let dimension: Dimension = name.parse().ok()?;
                let w = self.worst_performers.iter().find(|w| w.dimension == dimension)?;
                match metric {
                    "total_profit" => Some(MetricValue::Value(w.total_profit)),
                    "profit_margin_pct" => Some(MetricValue::from_option(w.profit_margin_pct)),
                    _ => None,
                }
            }
            "risk" => {
                let s = self.risk.segments.iter().find(|s| s.value == name)?;
                let v = match metric {
                    "loss_consistency_ratio" => s.loss_consistency_ratio,
                    "avg_loss_ratio" => s.avg_loss_ratio,
                    "std_loss_ratio" => s.std_loss_ratio,
                    "periods" => Decimal::from(s.periods),
                    "loss_periods" => Decimal::from(s.loss_periods),
                    _ => return None,
                };
                Some(MetricValue::Value(v))
            }
            _ => None,
        }
    }
}

fn percent(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator
        .checked_div(denominator)
        .map(|r| r * Decimal::ONE_HUNDRED)
}

/// 100 minus 2 points per margin percent below zero and 1.5 points per
/// loss-order percent above 15, floored at 0.
pub fn health_score(margin_pct: Option<Decimal>, loss_pct: Option<Decimal>) -> Decimal {
    let mut score = Decimal::ONE_HUNDRED;
    if let Some(m) = margin_pct {
        score -= (-m).max(Decimal::ZERO) * MARGIN_PENALTY;
    }
    if let Some(l) = loss_pct {
        score -= (l - LOSS_PCT_ALLOWANCE).max(Decimal::ZERO) * LOSS_PENALTY;
    }
    score.max(Decimal::ZERO)
}

fn worst_performers(records: &[TransactionRecord], places: u32) -> Vec<WorstPerformer> {
    PERFORMER_DIMENSIONS
        .iter()
        .filter_map(|&dimension| {
            compute(records, &[dimension], TimeBucket::None, places)
                .into_iter()
                .filter(|s| !s.key.is_top_level())
                .min_by(|a, b| a.total_profit.cmp(&b.total_profit))
                .and_then(|s| {
                    let value = s.key.value_of(dimension)?.to_string();
                    let margin_pct = match s.metric(KpiMetric::ProfitMarginPct) {
                        MetricValue::Value(v) => Some(v),
                        MetricValue::Degenerate => None,
                    };
                    Some(WorstPerformer {
                        dimension,
                        value,
                        total_profit: s.total_profit,
                        profit_margin_pct: margin_pct,
                    })
                })
        })
        .collect()
}

fn risk_profile(records: &[TransactionRecord], dimension: Dimension, places: u32) -> RiskProfile {
    let yearly: Vec<KpiSet> = compute(records, &[dimension], TimeBucket::Year, places)
        .into_iter()
        .filter(|s| !s.key.is_top_level())
        .collect();

    let mut segments: Vec<SegmentRisk> = Vec::new();
    // Sets arrive grouped by key: the `all` bucket first, then each year.
    let mut current: Option<(String, Vec<&KpiSet>)> = None;
    for set in &yearly {
        let Some(value) = set.key.value_of(dimension) else {
            continue;
        };
        if set.bucket == Bucket::All {
            if let Some((v, periods)) = current.take() {
                segments.push(segment_risk(v, &periods, places));
            }
            current = Some((value.to_string(), Vec::new()));
        } else if let Some((_, periods)) = current.as_mut() {
            periods.push(set);
        }
    }
    if let Some((v, periods)) = current.take() {
        segments.push(segment_risk(v, &periods, places));
    }

    segments.sort_by(|a, b| {
        b.avg_loss_ratio
            .cmp(&a.avg_loss_ratio)
            .then_with(|| a.value.cmp(&b.value))
    });

    let collapse = segments
        .iter()
        .any(|s| s.loss_consistency_ratio > Decimal::ZERO);
    let highest = segments.first().map(|s| s.avg_loss_ratio).unwrap_or_default();
    let risk_level = if collapse {
        RiskLevel::Severe
    } else if highest > HIGH_RISK_ABOVE {
        RiskLevel::High
    } else if highest > MODERATE_RISK_ABOVE {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    };

    RiskProfile {
        dimension,
        segments,
        risk_level,
    }
}

fn segment_risk(value: String, periods: &[&KpiSet], places: u32) -> SegmentRisk {
    let n = periods.len() as u64;
    let loss_periods = periods
        .iter()
        .filter(|p| p.total_profit < Decimal::ZERO)
        .count() as u64;

    let ratios: Vec<Decimal> = periods
        .iter()
        .filter_map(|p| {
            Decimal::from(p.loss_order_count).checked_div(Decimal::from(p.order_count))
        })
        .collect();

    let (avg, std) = mean_and_sample_std(&ratios);
    let std = round_half_even(std, places);

    SegmentRisk {
        value,
        periods: n,
        loss_periods,
        loss_consistency_ratio: if n == 0 {
            Decimal::ZERO
        } else {
            round_half_even(Decimal::from(loss_periods) / Decimal::from(n), places)
        },
        avg_loss_ratio: round_half_even(avg, places),
        std_loss_ratio: std,
        stability: Stability::classify(std),
    }
}

/// Sample standard deviation; a single observation has none and counts as 0.
fn mean_and_sample_std(values: &[Decimal]) -> (Decimal, Decimal) {
    if values.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let n = Decimal::from(values.len() as u64);
    let mean = values.iter().copied().sum::<Decimal>() / n;
    if values.len() < 2 {
        return (mean, Decimal::ZERO);
    }
    let squares: Decimal = values.iter().map(|v| (*v - mean) * (*v - mean)).sum();
    let variance = squares / (n - Decimal::ONE);
    (mean, variance.sqrt().unwrap_or_default())
}
