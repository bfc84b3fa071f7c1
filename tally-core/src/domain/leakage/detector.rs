// tally-core/src/domain/leakage/detector.rs

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::leakage::finding::{FindingSource, LeakageFinding, LeakageType, finding_id};
use crate::domain::leakage::rules::{LeakageRules, RuleConfig};
use crate::domain::metrics::{Bucket, DimensionKey, KpiSet, TimeBucket, round_half_even};
use crate::domain::record::TransactionRecord;

/// Floor of the severity denominator for zero-sales loss lines.
const SALES_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Applies the three leakage rules to a batch and its KPI sets.
pub struct LeakageDetector {
    rules: LeakageRules,
}

impl LeakageDetector {
    pub fn new(rules: LeakageRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &LeakageRules {
        &self.rules
    }

    #[instrument(skip_all, fields(records = records.len(), kpi_sets = kpi_sets.len()))]
    pub fn detect(
        &self,
        records: &[TransactionRecord],
        kpi_sets: &[KpiSet],
    ) -> Result<Vec<LeakageFinding>, DomainError> {
        let mut findings = Vec::new();

        let median = median_sales(records);
        for record in records {
            if let Some(f) = self.negative_profit(record, median)? {
                findings.push(f);
            }
            if let Some(f) = self.excessive_discount(record)? {
                findings.push(f);
            }
        }
        findings.extend(self.margin_erosion(kpi_sets));

        findings.sort_by(rank);
        info!(findings = findings.len(), "Leakage rules applied");
        Ok(findings)
    }

    fn negative_profit(
        &self,
        record: &TransactionRecord,
        median: Option<Decimal>,
    ) -> Result<Option<LeakageFinding>, DomainError> {
        if record.profit() >= Decimal::ZERO {
            return Ok(None);
        }
        let denominator = record.sales().max(SALES_EPSILON);
        let severity = record
            .profit()
            .abs()
            .checked_div(denominator)
            .ok_or_else(|| overflow(LeakageType::NegativeProfitOrder, record))?;

        let above_median = median.is_some_and(|m| record.sales() > m);
        let mut factors = BTreeMap::new();
        factors.insert("profit".to_string(), record.profit().normalize());
        factors.insert("sales".to_string(), record.sales().normalize());
        factors.insert("discount".to_string(), record.discount().normalize());
        factors.insert(
            "above_median_sales".to_string(),
            if above_median { Decimal::ONE } else { Decimal::ZERO },
        );

        Ok(Some(self.record_finding(LeakageType::NegativeProfitOrder, record, severity, factors)))
    }

    fn excessive_discount(&self, record: &TransactionRecord) -> Result<Option<LeakageFinding>, DomainError> {
        if record.discount() < self.rules.discount_threshold || record.sales().is_zero() {
            return Ok(None);
        }
        let margin = record
            .profit()
            .checked_div(record.sales())
            .ok_or_else(|| overflow(LeakageType::ExcessiveDiscountMargin, record))?;
        if margin >= self.rules.margin_floor {
            return Ok(None);
        }
        let severity = (record.discount() - self.rules.margin_floor)
            .checked_add(margin.abs())
            .ok_or_else(|| overflow(LeakageType::ExcessiveDiscountMargin, record))?;

        let places = self.rules.rounding_places;
        let mut factors = BTreeMap::new();
        factors.insert("discount".to_string(), record.discount().normalize());
        factors.insert("margin".to_string(), round_half_even(margin, places));
        factors.insert(
            "discount_threshold".to_string(),
            self.rules.discount_threshold.normalize(),
        );
        factors.insert("margin_floor".to_string(), self.rules.margin_floor.normalize());

        Ok(Some(self.record_finding(LeakageType::ExcessiveDiscountMargin, record, severity, factors)))
    }

    fn margin_erosion(&self, kpi_sets: &[KpiSet]) -> Vec<LeakageFinding> {
        // Latest margin per (key, grain), walked in chronological order.
        let mut chronological: Vec<&KpiSet> = kpi_sets.iter().collect();
        chronological.sort_by(|a, b| (&a.key, a.bucket).cmp(&(&b.key, b.bucket)));

        let mut previous: HashMap<(&DimensionKey, TimeBucket), Option<Decimal>> = HashMap::new();
        let mut findings = Vec::new();

        for set in chronological {
            let baseline = match set.bucket {
                Bucket::All => self.rules.baseline_for(&set.key),
                Bucket::Period(period) => previous
                    .insert((&set.key, period.grain()), set.profit_margin)
                    .flatten(),
            };
            let (Some(current), Some(baseline)) = (set.profit_margin, baseline) else {
                continue;
            };
            if baseline - current <= self.rules.erosion_delta {
                continue;
            }

            let mut factors = BTreeMap::new();
            factors.insert("baseline_margin".to_string(), baseline.normalize());
            factors.insert("current_margin".to_string(), current.normalize());
            factors.insert("erosion_delta".to_string(), self.rules.erosion_delta.normalize());

            let subject = set.subject_ref();
            findings.push(LeakageFinding {
                finding_id: finding_id(LeakageType::SegmentMarginErosion, &subject),
                leakage_type: LeakageType::SegmentMarginErosion,
                severity: round_half_even(baseline - current, self.rules.rounding_places),
                subject,
                factors,
                source: FindingSource::KpiSet {
                    key: set.key.clone(),
                    bucket: set.bucket,
                },
            });
        }
        debug!(findings = findings.len(), "Margin erosion checked");
        findings
    }

    fn record_finding(
        &self,
        leakage_type: LeakageType,
        record: &TransactionRecord,
        severity: Decimal,
        factors: BTreeMap<String, Decimal>,
    ) -> LeakageFinding {
        let subject = record.subject_ref();
        LeakageFinding {
            finding_id: finding_id(leakage_type, &subject),
            leakage_type,
            severity: round_half_even(severity, self.rules.rounding_places),
            subject,
            factors,
            source: FindingSource::Record {
                order_id: record.order_id().to_string(),
                line_id: record.line_id().to_string(),
            },
        }
    }
}

/// Validates `config` and runs every rule. Invalid thresholds fail before any rule runs.
pub fn detect(
    records: &[TransactionRecord],
    kpi_sets: &[KpiSet],
    config: &RuleConfig,
) -> Result<Vec<LeakageFinding>, DomainError> {
    let rules = config.validated()?;
    LeakageDetector::new(rules).detect(records, kpi_sets)
}

fn overflow(leakage_type: LeakageType, record: &TransactionRecord) -> DomainError {
    DomainError::Overflow(format!("{} severity of {}", leakage_type, record.subject_ref()))
}

fn rank(a: &LeakageFinding, b: &LeakageFinding) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.leakage_type.as_str().cmp(b.leakage_type.as_str()))
        .then_with(|| a.subject.cmp(&b.subject))
        .then_with(|| a.finding_id.cmp(&b.finding_id))
}

fn median_sales(records: &[TransactionRecord]) -> Option<Decimal> {
    if records.is_empty() {
        return None;
    }
    let mut sales: Vec<Decimal> = records.iter().map(|r| r.sales()).collect();
    sales.sort();
    let mid = sales.len() / 2;
    if sales.len() % 2 == 1 {
        Some(sales[mid])
    } else {
        Some((sales[mid - 1] + sales[mid]) / Decimal::TWO)
    }
}
