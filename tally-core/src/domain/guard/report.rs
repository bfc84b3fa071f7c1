// tally-core/src/domain/guard/report.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::guard::canonical::content_hash;
use crate::domain::insights::HealthSummary;
use crate::domain::leakage::LeakageFinding;
use crate::domain::metrics::{Bucket, DimensionKey, KpiSet};

/// Frozen, content-addressed output of one analysis run.
///
/// Only `ValidationGuard::seal` builds one; deserialization recomputes the
/// content hash and refuses a report whose content no longer matches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SealedEnvelope")]
pub struct ValidationReport {
    content_hash: String,
    generation: u64,
    generated_at: DateTime<Utc>,
    rounding_places: u32,
    kpi_sets: Vec<KpiSet>,
    findings: Vec<LeakageFinding>,
    summary: Option<HealthSummary>,
}

#[derive(Deserialize)]
struct SealedEnvelope {
    content_hash: String,
    generation: u64,
    generated_at: DateTime<Utc>,
    rounding_places: u32,
    kpi_sets: Vec<KpiSet>,
    findings: Vec<LeakageFinding>,
    #[serde(default)]
    summary: Option<HealthSummary>,
}

impl TryFrom<SealedEnvelope> for ValidationReport {
    type Error = DomainError;

    fn try_from(e: SealedEnvelope) -> Result<Self, Self::Error> {
        let recomputed = content_hash(
            e.rounding_places,
            &e.kpi_sets,
            &e.findings,
            e.summary.as_ref(),
        )?;
        if recomputed != e.content_hash {
            return Err(DomainError::ReportIntegrity {
                stored: e.content_hash,
                recomputed,
            });
        }
        Ok(Self {
            content_hash: e.content_hash,
            generation: e.generation,
            generated_at: e.generated_at,
            rounding_places: e.rounding_places,
            kpi_sets: e.kpi_sets,
            findings: e.findings,
            summary: e.summary,
        })
    }
}

impl ValidationReport {
    pub(crate) fn sealed(
        content_hash: String,
        generation: u64,
        rounding_places: u32,
        kpi_sets: Vec<KpiSet>,
        findings: Vec<LeakageFinding>,
        summary: Option<HealthSummary>,
    ) -> Self {
        Self {
            content_hash,
            generation,
            generated_at: Utc::now(),
            rounding_places,
            kpi_sets,
            findings,
            summary,
        }
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn rounding_places(&self) -> u32 {
        self.rounding_places
    }

    pub fn kpi_sets(&self) -> &[KpiSet] {
        &self.kpi_sets
    }

    pub fn findings(&self) -> &[LeakageFinding] {
        &self.findings
    }

    pub fn summary(&self) -> Option<&HealthSummary> {
        self.summary.as_ref()
    }

    /// KPI sets carrying the same (dimension, value) pairs, in any order, for `bucket`.
    pub fn kpi_sets_matching<'a>(
        &'a self,
        key: &'a DimensionKey,
        bucket: Bucket,
    ) -> impl Iterator<Item = &'a KpiSet> + 'a {
        self.kpi_sets
            .iter()
            .filter(move |s| s.bucket == bucket && s.key.same_pairs(key))
    }

    /// Whether `label` names something the report holds: a dimension value or
    /// key, a finding id or subject, a worst performer or a risk segment.
    pub fn knows_label(&self, label: &str) -> bool {
        let in_kpis = self.kpi_sets.iter().any(|s| {
            s.key.to_string() == label || s.key.pairs().iter().any(|(_, value)| value == label)
        });
        let in_findings = self
            .findings
            .iter()
            .any(|f| f.finding_id == label || f.subject == label);
        let in_summary = self.summary.as_ref().is_some_and(|s| {
            s.worst_performers.iter().any(|w| w.value == label)
                || s.risk.segments.iter().any(|r| r.value == label)
        });
        in_kpis || in_findings || in_summary
    }

    pub fn findings_with_id<'a>(&'a self, finding_id: &'a str) -> impl Iterator<Item = &'a LeakageFinding> + 'a {
        self.findings.iter().filter(move |f| f.finding_id == finding_id)
    }
}
