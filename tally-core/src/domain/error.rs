// tally-core/src/domain/error.rs

use miette::Diagnostic;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// A raw row that could not be coerced into a `TransactionRecord`.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq, Serialize)]
#[error("Row {row_index}: field '{field}' {reason}")]
#[diagnostic(
    code(tally::domain::schema),
    help("Fix the source row or set `on_invalid_row: skip` to exclude it from the batch.")
)]
pub struct SchemaError {
    pub row_index: usize,
    pub field: String,
    pub reason: String,
}

/// A threshold or analysis setting outside its valid domain. Never clamped.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Invalid rule configuration: '{parameter}' = {value} ({reason})")]
#[diagnostic(
    code(tally::domain::rule_config),
    help("Check the `rules` and `analysis` blocks of tally.yaml.")
)]
pub struct RuleConfigError {
    pub parameter: String,
    pub value: String,
    pub reason: String,
}

/// A downstream claim that does not match the sealed report.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Unverified claim: {claimed_value} for '{subject}' is not backed by the sealed report")]
#[diagnostic(
    code(tally::domain::hallucination),
    help("The explanation must not be shown as fact. Every number has to be cited as [[value|subject]].")
)]
pub struct HallucinationGuardError {
    pub claimed_value: Decimal,
    pub subject: String,
}

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("Batch rejected: {} invalid row(s)", .errors.len())]
    #[diagnostic(
        code(tally::domain::invalid_batch),
        help("`collect_errors` rejects the whole batch when any row is invalid.")
    )]
    InvalidBatch { errors: Vec<SchemaError> },

    #[error(transparent)]
    #[diagnostic(transparent)]
    RuleConfig(#[from] RuleConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    HallucinationGuard(#[from] HallucinationGuardError),

    #[error("Report integrity check failed: stored hash {stored}, recomputed {recomputed}")]
    #[diagnostic(
        code(tally::domain::integrity),
        help("The report was modified after sealing. Re-run `tally run` to produce a fresh one.")
    )]
    ReportIntegrity { stored: String, recomputed: String },

    #[error("Cannot seal report: {0}")]
    #[diagnostic(code(tally::domain::seal))]
    Unsealable(String),

    #[error("Arithmetic overflow in {0}")]
    #[diagnostic(code(tally::domain::overflow))]
    Overflow(String),

    #[error("Invalid subject '{0}'")]
    #[diagnostic(
        code(tally::domain::subject),
        help("Use `region=West/total_profit`, `West region total_profit`, `finding:<id>/severity` or `summary/<field>`.")
    )]
    InvalidSubject(String),

    #[error("Invalid value '{value}' for {kind}")]
    #[diagnostic(code(tally::domain::parse))]
    Parse { kind: &'static str, value: String },
}
