// tally-core/src/domain/guard/subject.rs
//
// Subjects name exactly one number in a sealed report.
//
//   region=West,category=Furniture@2024-Q1/total_profit   canonical KPI form
//   */total_sales                                          top-level set
//   West region total_profit                               natural KPI form
//   finding:NPO-1a2b3c4d5e6f7a8b/severity                  finding severity or factor
//   summary/health_score                                   health summary field

use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::guard::report::ValidationReport;
use crate::domain::metrics::{Bucket, DimensionKey, KpiMetric, MetricValue};
use crate::domain::record::Dimension;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingField {
    Severity,
    Factor(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Kpi {
        key: DimensionKey,
        bucket: Bucket,
        metric: KpiMetric,
    },
    Finding {
        finding_id: String,
        field: FindingField,
    },
    Summary {
        field: String,
    },
}

impl Subject {
    /// The single value this subject names in `report`.
    ///
    /// `None` when nothing or more than one thing matches. A degenerate margin
    /// resolves to `Some(MetricValue::Degenerate)`.
    pub fn resolve(&self, report: &ValidationReport) -> Option<MetricValue> {
        match self {
            Self::Kpi {
                key,
                bucket,
                metric,
            } => {
                let set = exactly_one(report.kpi_sets_matching(key, *bucket))?;
                Some(set.metric(*metric))
            }
            Self::Finding { finding_id, field } => {
                let finding = exactly_one(report.findings_with_id(finding_id))?;
                match field {
                    FindingField::Severity => Some(MetricValue::Value(finding.severity)),
                    FindingField::Factor(name) => finding.factor(name).map(MetricValue::Value),
                }
            }
            Self::Summary { field } => report.summary()?.metric(field),
        }
    }
}

fn exactly_one<T>(mut iter: impl Iterator<Item = T>) -> Option<T> {
    let first = iter.next()?;
    match iter.next() {
        Some(_) => None,
        None => Some(first),
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kpi {
                key,
                bucket: Bucket::All,
                metric,
            } => write!(f, "{}/{}", key, metric),
            Self::Kpi {
                key,
                bucket,
                metric,
            } => write!(f, "{}@{}/{}", key, bucket, metric),
            Self::Finding {
                finding_id,
                field: FindingField::Severity,
            } => write!(f, "finding:{}/severity", finding_id),
            Self::Finding {
                finding_id,
                field: FindingField::Factor(name),
            } => write!(f, "finding:{}/{}", finding_id, name),
            Self::Summary { field } => write!(f, "summary/{}", field),
        }
    }
}

impl FromStr for Subject {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::InvalidSubject(s.to_string());

        if let Some(rest) = s.strip_prefix("finding:") {
            let (id, field) = rest.split_once('/').ok_or_else(invalid)?;
            let (id, field) = (id.trim(), field.trim());
            if id.is_empty() || field.is_empty() {
                return Err(invalid());
            }
            let field = if field == "severity" {
                FindingField::Severity
            } else {
                FindingField::Factor(field.to_string())
            };
            return Ok(Self::Finding {
                finding_id: id.to_string(),
                field,
            });
        }

        if let Some(field) = s.strip_prefix("summary/") {
            let field = field.trim();
            if field.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Summary {
                field: field.to_string(),
            });
        }

        if let Some((scope, metric)) = s.rsplit_once('/') {
            let metric: KpiMetric = metric.parse().map_err(|_| invalid())?;
            let (key, bucket) = match scope.rsplit_once('@') {
                Some((key, bucket)) => (key, bucket.parse().map_err(|_| invalid())?),
                None => (scope, Bucket::All),
            };
            let key: DimensionKey = key.parse().map_err(|_| invalid())?;
            return Ok(Self::Kpi {
                key,
                bucket,
                metric,
            });
        }

        parse_natural(s).ok_or_else(invalid)
    }
}

/// `<value words> <dimension> [<value words> <dimension> ..] [@bucket] <metric>`.
fn parse_natural(s: &str) -> Option<Subject> {
    let mut words: Vec<&str> = s.split_whitespace().collect();
    let metric: KpiMetric = words.pop()?.parse().ok()?;

    let mut bucket = Bucket::All;
    let mut pairs: Vec<(Dimension, String)> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for word in words {
        if let Some(label) = word.strip_prefix('@') {
            bucket = label.parse().ok()?;
            continue;
        }
        match word.parse::<Dimension>() {
            Ok(dimension) if !pending.is_empty() => {
                pairs.push((dimension, pending.join(" ")));
                pending.clear();
            }
            _ => pending.push(word),
        }
    }
    if !pending.is_empty() {
        return None;
    }

    Some(Subject::Kpi {
        key: DimensionKey::new(pairs),
        bucket,
        metric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn canonical(s: &str) -> Result<String> {
        Ok(s.parse::<Subject>()?.to_string())
    }

    #[test]
    fn test_canonical_rendering() -> Result<()> {
        let rendered = [
            canonical("West region total_profit")?,
            canonical("Office Supplies category @2024-Q1 margin")?,
            canonical("East region Technology category sales")?,
            canonical("total_sales")?,
            canonical("*/total_sales")?,
            canonical("region=West@2024-03/profit_margin_pct")?,
            canonical(" finding:NPO-00ff00ff00ff00ff/severity ")?,
            canonical("finding:EDM-00ff00ff00ff00ff/discount")?,
            canonical("summary/health_score")?,
        ]
        .join("\n");

        insta::assert_snapshot!(rendered, @r"
        region=West/total_profit
        category=Office Supplies@2024-Q1/profit_margin
        region=East,category=Technology/total_sales
        */total_sales
        */total_sales
        region=West@2024-03/profit_margin_pct
        finding:NPO-00ff00ff00ff00ff/severity
        finding:EDM-00ff00ff00ff00ff/discount
        summary/health_score
        ");
        Ok(())
    }

    #[test]
    fn test_malformed_subjects_are_rejected() {
        for s in [
            "",
            "West region",
            "West total_profit",
            "planet=Mars/total_sales",
            "region=West/velocity",
            "region=West@yesterday/total_sales",
            "finding:/severity",
            "summary/",
        ] {
            assert!(s.parse::<Subject>().is_err(), "accepted {:?}", s);
        }
    }
}
