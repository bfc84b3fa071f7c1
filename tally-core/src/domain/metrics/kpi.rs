// tally-core/src/domain/metrics/kpi.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::metrics::period::Bucket;
use crate::domain::record::Dimension;

/// Ordered tuple of grouping-attribute values identifying one aggregate row.
/// The empty key is the top-level aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionKey(Vec<(Dimension, String)>);

impl DimensionKey {
    pub fn top_level() -> Self {
        Self::default()
    }

    pub fn new(pairs: Vec<(Dimension, String)>) -> Self {
        Self(pairs)
    }

    /// This key extended by one more grouping level.
    pub fn child(&self, dimension: Dimension, value: &str) -> Self {
        let mut pairs = self.0.clone();
        pairs.push((dimension, value.to_string()));
        Self(pairs)
    }

    pub fn pairs(&self) -> &[(Dimension, String)] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_top_level(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value_of(&self, dimension: Dimension) -> Option<&str> {
        self.0
            .iter()
            .find(|(d, _)| *d == dimension)
            .map(|(_, v)| v.as_str())
    }

    /// Same (dimension, value) pairs regardless of their order.
    pub fn same_pairs(&self, other: &DimensionKey) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut a = self.0.clone();
        let mut b = other.0.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(d, v)| format!("{}={}", d, v))
            .collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for DimensionKey {
    type Err = DomainError;

    /// Parses `region=West,category=Furniture`. Commas inside values are kept
    /// as long as the next fragment does not start with a known `dimension=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::top_level());
        }

        let mut pairs: Vec<(Dimension, String)> = Vec::new();
        for fragment in s.split(',') {
            let starts_pair = fragment
                .split_once('=')
                .and_then(|(d, v)| d.parse::<Dimension>().ok().map(|d| (d, v)));
            if let Some((dimension, value)) = starts_pair {
                pairs.push((dimension, value.trim().to_string()));
                continue;
            }
            match pairs.last_mut() {
                Some((_, value)) => {
                    value.push(',');
                    value.push_str(fragment);
                }
                None => {
                    return Err(DomainError::Parse {
                        kind: "dimension key",
                        value: s.to_string(),
                    });
                }
            }
        }
        Ok(Self(pairs))
    }
}

/// A numeric field of a KPI set that downstream text may cite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KpiMetric {
    TotalSales,
    TotalProfit,
    OrderCount,
    LineCount,
    LossOrderCount,
    AvgDiscount,
    ProfitMargin,
    ProfitMarginPct,
}

impl KpiMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalSales => "total_sales",
            Self::TotalProfit => "total_profit",
            Self::OrderCount => "order_count",
            Self::LineCount => "line_count",
            Self::LossOrderCount => "loss_order_count",
            Self::AvgDiscount => "avg_discount",
            Self::ProfitMargin => "profit_margin",
            Self::ProfitMarginPct => "profit_margin_pct",
        }
    }
}

impl fmt::Display for KpiMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KpiMetric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total_sales" | "sales" | "revenue" | "total_revenue" => Ok(Self::TotalSales),
            "total_profit" | "profit" => Ok(Self::TotalProfit),
            "order_count" | "orders" => Ok(Self::OrderCount),
            "line_count" | "lines" => Ok(Self::LineCount),
            "loss_order_count" | "loss_orders" => Ok(Self::LossOrderCount),
            "avg_discount" | "discount" => Ok(Self::AvgDiscount),
            "profit_margin" | "margin" => Ok(Self::ProfitMargin),
            "profit_margin_pct" | "margin_pct" => Ok(Self::ProfitMarginPct),
            _ => Err(DomainError::Parse {
                kind: "metric",
                value: s.to_string(),
            }),
        }
    }
}

/// A resolved metric. `Degenerate` is a defined outcome (division by zero),
/// distinct from a metric that is absent from the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
    Value(Decimal),
    Degenerate,
}

impl MetricValue {
    pub fn from_option(value: Option<Decimal>) -> Self {
        value.map_or(Self::Degenerate, Self::Value)
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Degenerate => None,
        }
    }
}

/// Aggregate over every record sharing a dimension key and time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    pub key: DimensionKey,
    pub bucket: Bucket,
    pub total_sales: Decimal,
    pub total_profit: Decimal,
    /// Distinct order ids.
    pub order_count: u64,
    pub line_count: u64,
    /// Distinct orders with at least one negative-profit line.
    pub loss_order_count: u64,
    pub avg_discount: Decimal,
    /// `None` when `total_sales` is zero.
    pub profit_margin: Option<Decimal>,
}

impl KpiSet {
    pub fn metric(&self, metric: KpiMetric) -> MetricValue {
        match metric {
            KpiMetric::TotalSales => MetricValue::Value(self.total_sales),
            KpiMetric::TotalProfit => MetricValue::Value(self.total_profit),
            KpiMetric::OrderCount => MetricValue::Value(Decimal::from(self.order_count)),
            KpiMetric::LineCount => MetricValue::Value(Decimal::from(self.line_count)),
            KpiMetric::LossOrderCount => MetricValue::Value(Decimal::from(self.loss_order_count)),
            KpiMetric::AvgDiscount => MetricValue::Value(self.avg_discount),
            KpiMetric::ProfitMargin => MetricValue::from_option(self.profit_margin),
            KpiMetric::ProfitMarginPct => MetricValue::from_option(
                self.profit_margin
                    .map(|m| (m * Decimal::ONE_HUNDRED).normalize()),
            ),
        }
    }

    /// `key@bucket`, the subject reference of KPI-level findings.
    pub fn subject_ref(&self) -> String {
        format!("{}@{}", self.key, self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_key_display_and_parse() -> Result<()> {
        let key = DimensionKey::top_level()
            .child(Dimension::Region, "West")
            .child(Dimension::Category, "Office Supplies");
        assert_eq!(key.to_string(), "region=West,category=Office Supplies");
        assert_eq!(key.to_string().parse::<DimensionKey>()?, key);
        assert_eq!("*".parse::<DimensionKey>()?, DimensionKey::top_level());
        Ok(())
    }

    #[test]
    fn test_key_parse_keeps_commas_inside_values() -> Result<()> {
        let key: DimensionKey = "sub_category=Art, Craft,region=East".parse()?;
        assert_eq!(key.value_of(Dimension::SubCategory), Some("Art, Craft"));
        assert_eq!(key.value_of(Dimension::Region), Some("East"));
        Ok(())
    }

    #[test]
    fn test_same_pairs_ignores_order() {
        let a = DimensionKey::top_level()
            .child(Dimension::Region, "West")
            .child(Dimension::Category, "Furniture");
        let b = DimensionKey::top_level()
            .child(Dimension::Category, "Furniture")
            .child(Dimension::Region, "West");
        assert!(a.same_pairs(&b));
        assert_ne!(a, b);
    }
}
