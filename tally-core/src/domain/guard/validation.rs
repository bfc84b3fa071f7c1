// tally-core/src/domain/guard/validation.rs

use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::{DomainError, HallucinationGuardError};
use crate::domain::guard::canonical::content_hash;
use crate::domain::guard::report::ValidationReport;
use crate::domain::guard::subject::Subject;
use crate::domain::insights::HealthSummary;
use crate::domain::leakage::{FindingSource, LeakageFinding};
use crate::domain::metrics::{KpiSet, MAX_ROUNDING_PLACES, MetricValue, round_half_even};

/// Seals calculator and detector output into reports and checks claims against them.
#[derive(Debug, Clone)]
pub struct ValidationGuard {
    rounding_places: u32,
    next_generation: u64,
}

impl ValidationGuard {
    pub fn new(rounding_places: u32) -> Self {
        Self {
            rounding_places,
            next_generation: 0,
        }
    }

    /// Continues the generation sequence of a previously sealed report.
    pub fn resume(previous: &ValidationReport, rounding_places: u32) -> Self {
        Self {
            rounding_places,
            next_generation: previous.generation() + 1,
        }
    }

    pub fn next_generation(&self) -> u64 {
        self.next_generation
    }

    pub fn seal(
        &mut self,
        kpi_sets: Vec<KpiSet>,
        findings: Vec<LeakageFinding>,
    ) -> Result<ValidationReport, DomainError> {
        self.seal_inner(kpi_sets, findings, None)
    }

    pub fn seal_with_summary(
        &mut self,
        kpi_sets: Vec<KpiSet>,
        findings: Vec<LeakageFinding>,
        summary: HealthSummary,
    ) -> Result<ValidationReport, DomainError> {
        self.seal_inner(kpi_sets, findings, Some(summary))
    }

    #[instrument(skip_all, fields(generation = self.next_generation))]
    fn seal_inner(
        &mut self,
        kpi_sets: Vec<KpiSet>,
        findings: Vec<LeakageFinding>,
        summary: Option<HealthSummary>,
    ) -> Result<ValidationReport, DomainError> {
        if self.rounding_places > MAX_ROUNDING_PLACES {
            return Err(DomainError::Unsealable(format!(
                "rounding places {} exceed {}",
                self.rounding_places, MAX_ROUNDING_PLACES
            )));
        }

        let mut groups = BTreeSet::new();
        for set in &kpi_sets {
            if !groups.insert((&set.key, set.bucket)) {
                return Err(DomainError::Unsealable(format!(
                    "duplicate KPI set {}",
                    set.subject_ref()
                )));
            }
        }

        for finding in &findings {
            if finding.severity < Decimal::ZERO {
                return Err(DomainError::Unsealable(format!(
                    "finding {} has negative severity",
                    finding.finding_id
                )));
            }
            if let FindingSource::KpiSet { key, bucket } = &finding.source {
                if !groups.contains(&(key, *bucket)) {
                    return Err(DomainError::Unsealable(format!(
                        "finding {} cites KPI set {}@{} which is not in the report",
                        finding.finding_id, key, bucket
                    )));
                }
            }
        }

        let hash = content_hash(self.rounding_places, &kpi_sets, &findings, summary.as_ref())?;
        let report = ValidationReport::sealed(
            hash,
            self.next_generation,
            self.rounding_places,
            kpi_sets,
            findings,
            summary,
        );
        self.next_generation += 1;

        info!(
            hash = %report.content_hash(),
            generation = report.generation(),
            kpi_sets = report.kpi_sets().len(),
            findings = report.findings().len(),
            "Report sealed"
        );
        Ok(report)
    }

    /// True only if `subject` names exactly one value in `report` and the claim
    /// equals it once both are rounded half-even to the report's precision.
    pub fn verify_citation(report: &ValidationReport, claimed_value: Decimal, subject: &str) -> bool {
        let parsed: Subject = match subject.parse() {
            Ok(s) => s,
            Err(_) => {
                debug!(subject, "Unparseable subject");
                return false;
            }
        };
        let places = report.rounding_places();
        match parsed.resolve(report) {
            Some(MetricValue::Value(stored)) => {
                round_half_even(claimed_value, places) == round_half_even(stored, places)
            }
            Some(MetricValue::Degenerate) | None => false,
        }
    }

    /// Hard rejection variant of [`ValidationGuard::verify_citation`].
    pub fn require_citation(
        report: &ValidationReport,
        claimed_value: Decimal,
        subject: &str,
    ) -> Result<(), HallucinationGuardError> {
        if Self::verify_citation(report, claimed_value, subject) {
            return Ok(());
        }
        warn!(%claimed_value, subject, hash = %report.content_hash(), "Citation rejected");
        Err(HallucinationGuardError {
            claimed_value,
            subject: subject.to_string(),
        })
    }
}
