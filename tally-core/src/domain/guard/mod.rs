// tally-core/src/domain/guard/mod.rs

pub mod canonical;
pub mod citation;
pub mod report;
pub mod subject;
pub mod validation;

pub use canonical::{REPORT_FORMAT, content_hash};
pub use citation::{Citation, GuardedText, guard_text, scan};
pub use report::ValidationReport;
pub use subject::{FindingField, Subject};
pub use validation::ValidationGuard;

use rust_decimal::Decimal;

/// See [`ValidationGuard::verify_citation`].
pub fn verify_citation(report: &ValidationReport, claimed_value: Decimal, claimed_subject: &str) -> bool {
    ValidationGuard::verify_citation(report, claimed_value, claimed_subject)
}
