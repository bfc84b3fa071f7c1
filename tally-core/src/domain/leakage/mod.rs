// tally-core/src/domain/leakage/mod.rs

pub mod detector;
pub mod finding;
pub mod rules;

pub use detector::{LeakageDetector, detect};
pub use finding::{FindingSource, LeakageFinding, LeakageType, finding_id};
pub use rules::{LeakageRules, RuleConfig};
