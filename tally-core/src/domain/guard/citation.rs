// tally-core/src/domain/guard/citation.rs

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::domain::error::{DomainError, HallucinationGuardError};
use crate::domain::guard::validation::ValidationGuard;
use crate::domain::guard::report::ValidationReport;

fn re_citation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[\s*([^|\]]+?)\s*\|\s*([^\]]+?)\s*\]\]")
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

fn re_code_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]*`").unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!())))
}

fn re_claimed_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[-+]?\$?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?%?$")
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

fn re_bare_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d+(?:[.,]\d+)*\b")
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

/// One `[[value|subject]]` claim found in gateway output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// The value exactly as written.
    pub text: String,
    pub value: Decimal,
    pub subject: String,
}

/// Every citation of a text plus the numbers written outside citation markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannedText {
    pub citations: Vec<Citation>,
    pub uncited: Vec<String>,
    /// Code spans holding digits that do not read as identifiers (ex: `999`, `0-10%`).
    pub opaque_spans: Vec<String>,
    /// Citations glued to a sign, a digit or another citation, which would change the rendered number.
    pub glued: Vec<Citation>,
}

/// Text that passed the guard: markup replaced by the cited values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedText {
    pub text: String,
    pub citations: Vec<Citation>,
    pub report_hash: String,
    pub generation: u64,
}

/// Parses a cited value, tolerating grouped thousands, a currency sign and a percent sign.
pub fn parse_claimed_value(text: &str) -> Result<Decimal, DomainError> {
    let parse_error = || DomainError::Parse {
        kind: "cited value",
        value: text.to_string(),
    };
    let trimmed = text.trim();
    if !re_claimed_value().is_match(trimmed) {
        return Err(parse_error());
    }
    let cleaned: String = trimmed
        .trim_end_matches('%')
        .chars()
        .filter(|c| !matches!(c, ',' | '$'))
        .collect();
    Decimal::from_str(&cleaned).map_err(|_| parse_error())
}

/// A code span reads as an identifier when each of its words starts with a letter.
fn is_identifier_span(span: &str) -> bool {
    !span.chars().any(|c| c.is_ascii_digit())
        || span.split_whitespace().all(|word| {
            word.chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || matches!(c, '*' | '_'))
        })
}

fn glued_before(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | ']')
}

fn glued_after(c: char) -> bool {
    c.is_ascii_digit() || c == '['
}

pub fn scan(text: &str) -> Result<ScannedText, DomainError> {
    let mut scanned = ScannedText::default();
    for caps in re_citation().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let value_text = caps.get(1).map_or("", |m| m.as_str());
        let subject = caps.get(2).map_or("", |m| m.as_str());
        let citation = Citation {
            text: value_text.to_string(),
            value: parse_claimed_value(value_text)?,
            subject: subject.to_string(),
        };

        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if before.is_some_and(glued_before) || after.is_some_and(glued_after) {
            scanned.glued.push(citation);
        } else {
            scanned.citations.push(citation);
        }
    }

    let without_markup = re_citation().replace_all(text, " ");
    scanned.opaque_spans = re_code_span()
        .find_iter(&without_markup)
        .map(|m| m.as_str().trim_matches('`').trim())
        .filter(|span| !is_identifier_span(span))
        .map(str::to_string)
        .collect();

    let prose = re_code_span().replace_all(&without_markup, " ");
    scanned.uncited = re_bare_number()
        .find_iter(&prose)
        .map(|m| m.as_str().to_string())
        .collect();

    Ok(scanned)
}

fn uncited(claimed_value: Decimal) -> DomainError {
    HallucinationGuardError {
        claimed_value,
        subject: "<uncited>".to_string(),
    }
    .into()
}

/// Checks every citation of `text` against `report` and releases it only if
/// all of them hold and no number appears outside citation markup.
///
/// A code span holding digits passes only when it names a label of the
/// report (a dimension value, a finding id or subject).
pub fn guard_text(report: &ValidationReport, text: &str) -> Result<GuardedText, DomainError> {
    let scanned = scan(text)?;

    if let Some(number) = scanned.uncited.first() {
        return Err(uncited(parse_claimed_value(number).unwrap_or_default()));
    }
    if let Some(span) = scanned.opaque_spans.iter().find(|s| !report.knows_label(s)) {
        return Err(uncited(leading_number(span)));
    }
    if let Some(citation) = scanned.glued.first() {
        return Err(uncited(citation.value));
    }
    for citation in &scanned.citations {
        ValidationGuard::require_citation(report, citation.value, &citation.subject)?;
    }

    let rendered = re_citation().replace_all(text, "$1").into_owned();
    Ok(GuardedText {
        text: rendered,
        citations: scanned.citations,
        report_hash: report.content_hash().to_string(),
        generation: report.generation(),
    })
}

fn leading_number(span: &str) -> Decimal {
    re_bare_number()
        .find(span)
        .and_then(|m| parse_claimed_value(m.as_str()).ok())
        .unwrap_or_default()
}
