// tally-core/src/domain/guard/canonical.rs

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::error::DomainError;
use crate::domain::insights::HealthSummary;
use crate::domain::leakage::LeakageFinding;
use crate::domain::metrics::KpiSet;

/// Version tag mixed into every content hash.
pub const REPORT_FORMAT: &str = "tally.report/v1";

/// The hashed part of a report. Field order is fixed, maps are ordered and
/// decimals serialize as normalized strings, so equal content gives equal bytes.
#[derive(Serialize)]
struct CanonicalView<'a> {
    format: &'static str,
    rounding_places: u32,
    kpi_sets: &'a [KpiSet],
    findings: &'a [LeakageFinding],
    summary: Option<&'a HealthSummary>,
}

pub fn canonical_bytes(
    rounding_places: u32,
    kpi_sets: &[KpiSet],
    findings: &[LeakageFinding],
    summary: Option<&HealthSummary>,
) -> Result<Vec<u8>, DomainError> {
    let view = CanonicalView {
        format: REPORT_FORMAT,
        rounding_places,
        kpi_sets,
        findings,
        summary,
    };
    serde_json::to_vec(&view).map_err(|e| DomainError::Unsealable(e.to_string()))
}

/// SHA-256 hex of the canonical bytes.
pub fn content_hash(
    rounding_places: u32,
    kpi_sets: &[KpiSet],
    findings: &[LeakageFinding],
    summary: Option<&HealthSummary>,
) -> Result<String, DomainError> {
    let bytes = canonical_bytes(rounding_places, kpi_sets, findings, summary)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{TimeBucket, compute};
    use crate::domain::record::transaction::fixtures::{line, record};
    use anyhow::Result;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hash_depends_on_content_only() -> Result<()> {
        let records = vec![record(line("o1", dec!(20), dec!(-5)))];
        let sets = compute(&records, &[], TimeBucket::None, 4);

        let a = content_hash(4, &sets, &[], None)?;
        let b = content_hash(4, &sets, &[], None)?;
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        assert_ne!(a, content_hash(2, &sets, &[], None)?);

        let mut tampered = sets.clone();
        tampered[0].total_profit = dec!(-4);
        assert_ne!(a, content_hash(4, &tampered, &[], None)?);
        Ok(())
    }

    #[test]
    fn test_decimals_are_written_as_strings() -> Result<()> {
        let records = vec![record(line("o1", dec!(20.50), dec!(-5)))];
        let sets = compute(&records, &[], TimeBucket::None, 4);
        let text = String::from_utf8(canonical_bytes(4, &sets, &[], None)?)?;
        assert!(text.starts_with(r#"{"format":"tally.report/v1","rounding_places":4,"#));
        assert!(text.contains(r#""total_sales":"20.5""#));
        Ok(())
    }
}
