// tally-core/src/domain/metrics/period.rs

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Granularity of the time axis of a KPI computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    #[default]
    None,
    Day,
    Month,
    Quarter,
    Year,
}

impl TimeBucket {
    pub fn period_of(self, date: NaiveDate) -> Option<Period> {
        let start = match self {
            Self::None => return None,
            Self::Day => date,
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
            Self::Quarter => {
                NaiveDate::from_ymd_opt(date.year(), ((date.month() - 1) / 3) * 3 + 1, 1)?
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
        };
        Some(Period { grain: self, start })
    }
}

impl FromStr for TimeBucket {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            _ => Err(DomainError::Parse {
                kind: "time_bucket",
                value: s.to_string(),
            }),
        }
    }
}

/// A calendar period, identified by its grain and first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    grain: TimeBucket,
    start: NaiveDate,
}

impl Period {
    pub fn grain(&self) -> TimeBucket {
        self.grain
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.grain {
            TimeBucket::Quarter => write!(
                f,
                "{}-Q{}",
                self.start.year(),
                (self.start.month() - 1) / 3 + 1
            ),
            TimeBucket::Year => write!(f, "{}", self.start.year()),
            TimeBucket::Month => write!(f, "{}", self.start.format("%Y-%m")),
            TimeBucket::Day | TimeBucket::None => write!(f, "{}", self.start.format("%Y-%m-%d")),
        }
    }
}

/// Time slice a KPI set covers: the whole range, or one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Bucket {
    #[default]
    All,
    Period(Period),
}

impl Bucket {
    pub fn period(&self) -> Option<Period> {
        match self {
            Self::All => None,
            Self::Period(p) => Some(*p),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Period(p) => write!(f, "{}", p),
        }
    }
}

impl FromStr for Bucket {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::Parse {
            kind: "time bucket label",
            value: s.to_string(),
        };

        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let (grain, date) = if let Some((year, quarter)) = s.split_once("-Q") {
            let year: i32 = year.parse().map_err(|_| invalid())?;
            let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
            if !(1..=4).contains(&quarter) {
                return Err(invalid());
            }
            (
                TimeBucket::Quarter,
                NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1),
            )
        } else {
            match s.len() {
                4 => (
                    TimeBucket::Year,
                    s.parse().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
                ),
                7 => (
                    TimeBucket::Month,
                    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok(),
                ),
                10 => (TimeBucket::Day, NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
                _ => return Err(invalid()),
            }
        };

        let date = date.ok_or_else(invalid)?;
        grain.period_of(date).map(Self::Period).ok_or_else(invalid)
    }
}

impl From<Bucket> for String {
    fn from(bucket: Bucket) -> Self {
        bucket.to_string()
    }
}

impl TryFrom<String> for Bucket {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
