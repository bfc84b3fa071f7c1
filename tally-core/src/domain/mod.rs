pub mod error;
pub mod guard;
pub mod insights;
pub mod leakage;
pub mod metrics;
pub mod project;
pub mod record;

// Re-exports so callers can write `use tally_core::domain::DomainError`
pub use error::DomainError;
