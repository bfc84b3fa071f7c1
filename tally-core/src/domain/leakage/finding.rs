// tally-core/src/domain/leakage/finding.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::metrics::{Bucket, DimensionKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeakageType {
    NegativeProfitOrder,
    ExcessiveDiscountMargin,
    SegmentMarginErosion,
}

impl LeakageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegativeProfitOrder => "NEGATIVE_PROFIT_ORDER",
            Self::ExcessiveDiscountMargin => "EXCESSIVE_DISCOUNT_MARGIN",
            Self::SegmentMarginErosion => "SEGMENT_MARGIN_EROSION",
        }
    }

    /// Short rule code used as the finding id prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NegativeProfitOrder => "NPO",
            Self::ExcessiveDiscountMargin => "EDM",
            Self::SegmentMarginErosion => "SME",
        }
    }
}

impl fmt::Display for LeakageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeakageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NEGATIVE_PROFIT_ORDER" | "NPO" => Ok(Self::NegativeProfitOrder),
            "EXCESSIVE_DISCOUNT_MARGIN" | "EDM" => Ok(Self::ExcessiveDiscountMargin),
            "SEGMENT_MARGIN_EROSION" | "SME" => Ok(Self::SegmentMarginErosion),
            _ => Err(DomainError::Parse {
                kind: "leakage type",
                value: s.to_string(),
            }),
        }
    }
}

/// What a finding was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingSource {
    Record { order_id: String, line_id: String },
    KpiSet { key: DimensionKey, bucket: Bucket },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageFinding {
    pub finding_id: String,
    pub leakage_type: LeakageType,
    pub severity: Decimal,
    pub subject: String,
    pub factors: BTreeMap<String, Decimal>,
    pub source: FindingSource,
}

impl LeakageFinding {
    pub fn factor(&self, name: &str) -> Option<Decimal> {
        self.factors.get(name).copied()
    }
}

/// `<CODE>-<16 hex>`: stable across runs for the same rule and subject.
pub fn finding_id(leakage_type: LeakageType, subject: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(leakage_type.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(subject.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", leakage_type.code(), &digest[..16])
}
