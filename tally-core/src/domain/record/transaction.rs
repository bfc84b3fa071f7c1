// tally-core/src/domain/record/transaction.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;
use crate::domain::record::raw::normalize_field_name;

/// A grouping attribute of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    Segment,
    Category,
    SubCategory,
    ShipMode,
    /// Derived from the discount rate (`0-10%`, `10-20%`, `20-30%`, `30%+`).
    DiscountBand,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Region,
        Dimension::Segment,
        Dimension::Category,
        Dimension::SubCategory,
        Dimension::ShipMode,
        Dimension::DiscountBand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Segment => "segment",
            Self::Category => "category",
            Self::SubCategory => "sub_category",
            Self::ShipMode => "ship_mode",
            Self::DiscountBand => "discount_band",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_field_name(s).as_str() {
            "region" => Ok(Self::Region),
            "segment" => Ok(Self::Segment),
            "category" => Ok(Self::Category),
            "sub_category" | "subcategory" => Ok(Self::SubCategory),
            "ship_mode" | "shipmode" => Ok(Self::ShipMode),
            "discount_band" | "discount_bucket" => Ok(Self::DiscountBand),
            _ => Err(DomainError::Parse {
                kind: "dimension",
                value: s.to_string(),
            }),
        }
    }
}

/// Band label for a discount rate, right-inclusive at 10%, 20% and 30%.
pub fn discount_band(discount: Decimal) -> &'static str {
    if discount <= Decimal::new(10, 2) {
        "0-10%"
    } else if discount <= Decimal::new(20, 2) {
        "10-20%"
    } else if discount <= Decimal::new(30, 2) {
        "20-30%"
    } else {
        "30%+"
    }
}

/// Largest accepted sales or profit magnitude (10^15).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Most decimals accepted on sales and profit.
pub const MAX_AMOUNT_SCALE: u32 = 10;

/// Unvalidated field values for one line item.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub order_id: String,
    pub line_id: String,
    pub order_date: NaiveDate,
    pub region: String,
    pub segment: String,
    pub category: String,
    pub sub_category: String,
    pub ship_mode: String,
    pub sales: Decimal,
    pub quantity: u32,
    pub discount: Decimal,
    pub profit: Decimal,
}

/// Field name and reason of a violated domain range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: String,
}

/// One sales line item. Only constructible through range validation; immutable afterwards.
///
/// Sales and profit stay within `MAX_AMOUNT` with at most `MAX_AMOUNT_SCALE`
/// decimals, so per-record ratios always fit a `Decimal` and sums overflow
/// only past roughly 7.9e13 lines.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    order_id: String,
    line_id: String,
    order_date: NaiveDate,
    region: String,
    segment: String,
    category: String,
    sub_category: String,
    ship_mode: String,
    sales: Decimal,
    quantity: u32,
    discount: Decimal,
    profit: Decimal,
}

impl TryFrom<LineItem> for TransactionRecord {
    type Error = FieldViolation;

    fn try_from(item: LineItem) -> Result<Self, Self::Error> {
        if item.order_id.trim().is_empty() {
            return Err(FieldViolation {
                field: "order_id",
                reason: "is empty".into(),
            });
        }
        if item.line_id.trim().is_empty() {
            return Err(FieldViolation {
                field: "line_id",
                reason: "is empty".into(),
            });
        }
        if item.sales < Decimal::ZERO {
            return Err(FieldViolation {
                field: "sales",
                reason: format!("must be >= 0, got {}", item.sales),
            });
        }
        for (field, amount) in [("sales", item.sales), ("profit", item.profit)] {
            if amount.abs() > MAX_AMOUNT {
                return Err(FieldViolation {
                    field,
                    reason: format!("magnitude must be <= {}, got {}", MAX_AMOUNT, amount),
                });
            }
            if amount.normalize().scale() > MAX_AMOUNT_SCALE {
                return Err(FieldViolation {
                    field,
                    reason: format!("at most {} decimals allowed, got {}", MAX_AMOUNT_SCALE, amount),
                });
            }
        }
        if item.discount < Decimal::ZERO || item.discount > Decimal::ONE {
            return Err(FieldViolation {
                field: "discount",
                reason: format!("must be within [0, 1], got {}", item.discount),
            });
        }

        Ok(Self {
            order_id: item.order_id,
            line_id: item.line_id,
            order_date: item.order_date,
            region: item.region,
            segment: item.segment,
            category: item.category,
            sub_category: item.sub_category,
            ship_mode: item.ship_mode,
            sales: item.sales,
            quantity: item.quantity,
            discount: item.discount,
            profit: item.profit,
        })
    }
}

impl TransactionRecord {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn line_id(&self) -> &str {
        &self.line_id
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn sales(&self) -> Decimal {
        self.sales
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn discount(&self) -> Decimal {
        self.discount
    }

    pub fn profit(&self) -> Decimal {
        self.profit
    }

    pub fn attribute(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Region => &self.region,
            Dimension::Segment => &self.segment,
            Dimension::Category => &self.category,
            Dimension::SubCategory => &self.sub_category,
            Dimension::ShipMode => &self.ship_mode,
            Dimension::DiscountBand => discount_band(self.discount),
        }
    }

    /// Stable reference used as the subject of record-level findings.
    pub fn subject_ref(&self) -> String {
        format!("{}/{}", self.order_id, self.line_id)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::line;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_negative_sales_rejected() {
        let res = TransactionRecord::try_from(line("o1", dec!(-1), dec!(0)));
        assert!(matches!(res, Err(FieldViolation { field: "sales", .. })));
    }

    #[test]
    fn test_discount_out_of_range_rejected() {
        let mut item = line("o1", dec!(10), dec!(1));
        item.discount = dec!(1.2);
        let res = TransactionRecord::try_from(item);
        assert!(matches!(res, Err(FieldViolation { field: "discount", .. })));
    }

    #[test]
    fn test_amounts_beyond_bounds_rejected() {
        let huge = dec!(50000000000000000000000000000);
        let res = TransactionRecord::try_from(line("o1", huge, dec!(0)));
        assert!(matches!(res, Err(FieldViolation { field: "sales", .. })));

        let res = TransactionRecord::try_from(line("o1", dec!(10), -MAX_AMOUNT - dec!(1)));
        assert!(matches!(res, Err(FieldViolation { field: "profit", .. })));

        let res = TransactionRecord::try_from(line("o1", dec!(0.00000000001), dec!(-1)));
        assert!(matches!(res, Err(FieldViolation { field: "sales", .. })));

        assert!(TransactionRecord::try_from(line("o1", MAX_AMOUNT, -MAX_AMOUNT)).is_ok());
        assert!(TransactionRecord::try_from(line("o1", dec!(41.913600), dec!(0))).is_ok());
    }

    #[test]
    fn test_negative_profit_allowed() {
        assert!(TransactionRecord::try_from(line("o1", dec!(10), dec!(-50))).is_ok());
    }

    #[test]
    fn test_discount_band_edges() {
        assert_eq!(discount_band(dec!(0)), "0-10%");
        assert_eq!(discount_band(dec!(0.10)), "0-10%");
        assert_eq!(discount_band(dec!(0.15)), "10-20%");
        assert_eq!(discount_band(dec!(0.30)), "20-30%");
        assert_eq!(discount_band(dec!(0.8)), "30%+");
    }

    #[test]
    fn test_dimension_parsing_aliases() -> anyhow::Result<()> {
        assert_eq!("Sub-Category".parse::<Dimension>()?, Dimension::SubCategory);
        assert_eq!("ship mode".parse::<Dimension>()?, Dimension::ShipMode);
        assert!("country".parse::<Dimension>().is_err());
        Ok(())
    }
}
