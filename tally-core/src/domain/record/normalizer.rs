// tally-core/src/domain/record/normalizer.rs
//
// Boundary between untyped source rows and `TransactionRecord`.
// Nothing downstream of this file accepts untyped data.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};

use crate::domain::error::{DomainError, SchemaError};
use crate::domain::record::raw::{RawRow, normalize_field_name};
use crate::domain::record::transaction::{LineItem, TransactionRecord};

/// What to do with a row that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRowPolicy {
    /// Fail the batch on the first invalid row.
    #[default]
    Abort,
    /// Exclude invalid rows; their errors are returned alongside the records.
    Skip,
    /// Examine every row, then reject the batch if any row was invalid.
    CollectErrors,
}

impl fmt::Display for InvalidRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
            Self::CollectErrors => "collect_errors",
        })
    }
}

impl FromStr for InvalidRowPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_field_name(s).as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            "collect_errors" | "collect" => Ok(Self::CollectErrors),
            _ => Err(DomainError::Parse {
                kind: "on_invalid_row",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<TransactionRecord>,
    /// Rows excluded under `InvalidRowPolicy::Skip`.
    pub rejected: Vec<SchemaError>,
    pub rows_seen: usize,
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

pub struct Normalizer {
    policy: InvalidRowPolicy,
}

impl Normalizer {
    pub fn new(policy: InvalidRowPolicy) -> Self {
        Self { policy }
    }

    #[instrument(skip_all, fields(policy = %self.policy))]
    pub fn normalize<I>(&self, rows: I) -> Result<NormalizedBatch, DomainError>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let mut batch = NormalizedBatch::default();
        let mut errors = Vec::new();
        let mut accepted: Vec<(usize, TransactionRecord)> = Vec::new();
        let mut seen_keys: HashSet<(String, String)> = HashSet::new();

        for (row_index, row) in rows.into_iter().enumerate() {
            batch.rows_seen += 1;
            let checked = Self::normalize_row(row_index, &row).and_then(|record| {
                let key = (record.order_id().to_string(), record.line_id().to_string());
                if !seen_keys.insert(key) && self.policy == InvalidRowPolicy::Abort {
                    return Err(duplicate_key(row_index, &record));
                }
                Ok(record)
            });
            match checked {
                Ok(record) => accepted.push((row_index, record)),
                Err(err) => match self.policy {
                    InvalidRowPolicy::Abort => return Err(err.into()),
                    InvalidRowPolicy::Skip => batch.rejected.push(err),
                    InvalidRowPolicy::CollectErrors => errors.push(err),
                },
            }
        }

        // Every occurrence of a repeated key is invalid, whichever came first.
        let mut occurrences: HashMap<(&str, &str), usize> = HashMap::new();
        for (_, record) in &accepted {
            *occurrences
                .entry((record.order_id(), record.line_id()))
                .or_default() += 1;
        }
        let duplicated: Vec<bool> = accepted
            .iter()
            .map(|(_, r)| occurrences.get(&(r.order_id(), r.line_id())).copied().unwrap_or(0) > 1)
            .collect();
        for ((row_index, record), is_duplicate) in accepted.into_iter().zip(duplicated) {
            if !is_duplicate {
                batch.records.push(record);
                continue;
            }
            let err = duplicate_key(row_index, &record);
            match self.policy {
                InvalidRowPolicy::CollectErrors => errors.push(err),
                _ => batch.rejected.push(err),
            }
        }

        if !errors.is_empty() {
            errors.sort_by_key(|e| e.row_index);
            return Err(DomainError::InvalidBatch { errors });
        }
        batch.rejected.sort_by_key(|e| e.row_index);
        for err in &batch.rejected {
            warn!(row = err.row_index, field = %err.field, reason = %err.reason, "Skipping invalid row");
        }

        info!(
            rows = batch.rows_seen,
            records = batch.records.len(),
            rejected = batch.rejected.len(),
            "Rows normalized"
        );
        Ok(batch)
    }

    pub fn normalize_row(row_index: usize, row: &RawRow) -> Result<TransactionRecord, SchemaError> {
        let fields: BTreeMap<String, &Value> = row
            .iter()
            .map(|(k, v)| (normalize_field_name(k), v))
            .collect();
        let row = RowView {
            row_index,
            fields: &fields,
        };

        let item = LineItem {
            order_id: row.text(&["order_id"])?,
            line_id: row.text(&["line_id", "row_id"])?,
            order_date: row.date(&["order_date", "date"])?,
            region: row.text(&["region"])?,
            segment: row.text(&["segment"])?,
            category: row.text(&["category"])?,
            sub_category: row.text(&["sub_category"])?,
            ship_mode: row.text(&["ship_mode"])?,
            sales: row.decimal(&["sales"])?,
            quantity: row.quantity(&["quantity"])?,
            discount: row.decimal(&["discount"])?,
            profit: row.decimal(&["profit"])?,
        };

        TransactionRecord::try_from(item).map_err(|v| SchemaError {
            row_index,
            field: v.field.to_string(),
            reason: v.reason,
        })
    }
}

fn duplicate_key(row_index: usize, record: &TransactionRecord) -> SchemaError {
    SchemaError {
        row_index,
        field: "line_id".to_string(),
        reason: format!(
            "repeats order '{}' line '{}' of another row",
            record.order_id(),
            record.line_id()
        ),
    }
}

struct RowView<'a> {
    row_index: usize,
    fields: &'a BTreeMap<String, &'a Value>,
}

impl RowView<'_> {
    fn error(&self, field: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError {
            row_index: self.row_index,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// First present, non-null alias.
    fn lookup(&self, names: &[&'static str]) -> Result<(&'static str, &Value), SchemaError> {
        names
            .iter()
            .find_map(|name| match self.fields.get(*name) {
                Some(v) if !v.is_null() => Some((*name, *v)),
                _ => None,
            })
            .ok_or_else(|| self.error(names[0], "is missing"))
    }

    fn scalar(&self, names: &[&'static str]) -> Result<(&'static str, String), SchemaError> {
        let (name, value) = self.lookup(names)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(self.error(name, "must be a scalar value")),
        };
        if text.is_empty() {
            return Err(self.error(name, "is empty"));
        }
        Ok((name, text))
    }

    fn text(&self, names: &[&'static str]) -> Result<String, SchemaError> {
        self.scalar(names).map(|(_, text)| text)
    }

    fn decimal(&self, names: &[&'static str]) -> Result<Decimal, SchemaError> {
        let (name, text) = self.scalar(names)?;
        parse_decimal(&text).ok_or_else(|| self.error(name, format!("is not a number: '{}'", text)))
    }

    fn quantity(&self, names: &[&'static str]) -> Result<u32, SchemaError> {
        let (name, text) = self.scalar(names)?;
        let value = parse_decimal(&text)
            .ok_or_else(|| self.error(name, format!("is not a number: '{}'", text)))?;
        if !value.fract().is_zero() || value < Decimal::ZERO {
            return Err(self.error(name, format!("must be a non-negative integer, got {}", text)));
        }
        value
            .to_u32()
            .ok_or_else(|| self.error(name, format!("is out of range: {}", text)))
    }

    fn date(&self, names: &[&'static str]) -> Result<NaiveDate, SchemaError> {
        let (name, text) = self.scalar(names)?;
        parse_date(&text).ok_or_else(|| self.error(name, format!("is not a date: '{}'", text)))
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRow {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => RawRow::new(),
        }
    }

    fn valid_row(order_id: &str) -> RawRow {
        raw(json!({
            "Row ID": "7",
            "Order ID": order_id,
            "Order Date": "11/08/2016",
            "Ship Mode": "Second Class",
            "Segment": "Consumer",
            "Region": "South",
            "Category": "Furniture",
            "Sub-Category": "Bookcases",
            "Sales": "261.96",
            "Quantity": 2,
            "Discount": 0,
            "Profit": 41.9136
        }))
    }

    #[test]
    fn test_normalize_superstore_row() -> anyhow::Result<()> {
        let record = Normalizer::normalize_row(0, &valid_row("CA-2016-152156"))?;
        assert_eq!(record.order_id(), "CA-2016-152156");
        assert_eq!(record.line_id(), "7");
        assert_eq!(record.sales(), dec!(261.96));
        assert_eq!(record.profit(), dec!(41.9136));
        assert_eq!(record.quantity(), 2);
        assert_eq!(
            record.order_date(),
            NaiveDate::from_ymd_opt(2016, 11, 8).unwrap_or_default()
        );
        Ok(())
    }

    #[test]
    fn test_missing_field_reports_row_and_field() {
        let mut row = valid_row("o1");
        row.remove("Profit");
        let err = Normalizer::normalize_row(3, &row).err();
        assert_eq!(
            err,
            Some(SchemaError {
                row_index: 3,
                field: "profit".into(),
                reason: "is missing".into(),
            })
        );
    }

    #[test]
    fn test_fractional_quantity_rejected() {
        let mut row = valid_row("o1");
        row.insert("Quantity".into(), json!(1.5));
        let err = Normalizer::normalize_row(0, &row).err();
        assert!(matches!(err, Some(SchemaError { ref field, .. }) if field == "quantity"));
    }

    #[test]
    fn test_discount_above_one_rejected() {
        let mut row = valid_row("o1");
        row.insert("Discount".into(), json!("1.5"));
        let err = Normalizer::normalize_row(0, &row).err();
        assert!(matches!(err, Some(SchemaError { ref field, .. }) if field == "discount"));
    }

    fn mixed_rows() -> Vec<RawRow> {
        let mut bad = valid_row("o2");
        bad.insert("Sales".into(), json!("-4"));
        let mut worse = valid_row("o3");
        worse.insert("Order Date".into(), json!("yesterday"));
        vec![valid_row("o1"), bad, worse, valid_row("o4")]
    }

    #[test]
    fn test_policy_abort_stops_at_first_error() {
        let res = Normalizer::new(InvalidRowPolicy::Abort).normalize(mixed_rows());
        assert!(matches!(
            res,
            Err(DomainError::Schema(SchemaError { row_index: 1, .. }))
        ));
    }

    #[test]
    fn test_policy_skip_keeps_valid_rows_and_reports_rejects() -> anyhow::Result<()> {
        let batch = Normalizer::new(InvalidRowPolicy::Skip).normalize(mixed_rows())?;
        assert_eq!(batch.rows_seen, 4);
        assert_eq!(batch.records.len(), 2);
        let rejected: Vec<usize> = batch.rejected.iter().map(|e| e.row_index).collect();
        assert_eq!(rejected, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_policy_collect_errors_rejects_batch_with_all_errors() {
        let res = Normalizer::new(InvalidRowPolicy::CollectErrors).normalize(mixed_rows());
        match res {
            Err(DomainError::InvalidBatch { errors }) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "sales");
                assert_eq!(errors[1].field, "order_date");
            }
            other => panic!("Expected InvalidBatch, got {:?}", other.map(|b| b.records.len())),
        }
    }

    fn rows_with_repeated_line() -> Vec<RawRow> {
        let mut cheap = valid_row("o1");
        cheap.insert("Sales".into(), json!("10"));
        vec![valid_row("o1"), valid_row("o2"), cheap]
    }

    #[test]
    fn test_repeated_order_line_aborts() {
        let res = Normalizer::new(InvalidRowPolicy::Abort).normalize(rows_with_repeated_line());
        assert!(matches!(
            res,
            Err(DomainError::Schema(SchemaError { row_index: 2, ref field, .. })) if field == "line_id"
        ));
    }

    #[test]
    fn test_repeated_order_line_drops_every_occurrence() -> anyhow::Result<()> {
        let mut rows = rows_with_repeated_line();
        let batch = Normalizer::new(InvalidRowPolicy::Skip).normalize(rows.clone())?;
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].order_id(), "o2");
        let rejected: Vec<usize> = batch.rejected.iter().map(|e| e.row_index).collect();
        assert_eq!(rejected, vec![0, 2]);

        rows.reverse();
        let reversed = Normalizer::new(InvalidRowPolicy::Skip).normalize(rows)?;
        assert_eq!(reversed.records, batch.records);
        Ok(())
    }

    #[test]
    fn test_repeated_order_line_is_collected() {
        let res = Normalizer::new(InvalidRowPolicy::CollectErrors).normalize(rows_with_repeated_line());
        match res {
            Err(DomainError::InvalidBatch { errors }) => {
                let rows: Vec<usize> = errors.iter().map(|e| e.row_index).collect();
                assert_eq!(rows, vec![0, 2]);
                assert!(errors.iter().all(|e| e.field == "line_id"));
            }
            other => panic!("Expected InvalidBatch, got {:?}", other.map(|b| b.records.len())),
        }
    }

    #[test]
    fn test_policy_parsing() -> anyhow::Result<()> {
        assert_eq!(
            "collect_errors".parse::<InvalidRowPolicy>()?,
            InvalidRowPolicy::CollectErrors
        );
        assert!("ignore".parse::<InvalidRowPolicy>().is_err());
        Ok(())
    }
}
