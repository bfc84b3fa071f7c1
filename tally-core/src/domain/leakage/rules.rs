// tally-core/src/domain/leakage/rules.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

use crate::domain::error::RuleConfigError;
use crate::domain::guard::ValidationReport;
use crate::domain::metrics::{Bucket, DEFAULT_ROUNDING_PLACES, DimensionKey};

/// Thresholds of the leakage rules, as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RuleConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_discount_threshold")]
    pub discount_threshold: f64,

    #[validate(range(max = 1.0))]
    #[serde(default)]
    pub margin_floor: f64,

    #[validate(range(min = 0.0))]
    #[serde(default = "default_erosion_delta")]
    pub erosion_delta: f64,

    #[validate(range(max = 28))]
    #[serde(default = "default_rounding_places")]
    pub rounding_places: u32,

    /// Externally supplied baseline margins, keyed like `region=West`.
    #[serde(default)]
    pub baselines: BTreeMap<String, f64>,
}

fn default_discount_threshold() -> f64 {
    0.4
}

fn default_erosion_delta() -> f64 {
    0.05
}

fn default_rounding_places() -> u32 {
    DEFAULT_ROUNDING_PLACES
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            discount_threshold: default_discount_threshold(),
            margin_floor: 0.0,
            erosion_delta: default_erosion_delta(),
            rounding_places: default_rounding_places(),
            baselines: BTreeMap::new(),
        }
    }
}

impl RuleConfig {
    /// Checks every threshold against its domain and converts to exact decimals.
    pub fn validated(&self) -> Result<LeakageRules, RuleConfigError> {
        // NaN slips through range checks, so finiteness goes first.
        let discount_threshold = exact("discount_threshold", self.discount_threshold)?;
        let margin_floor = exact("margin_floor", self.margin_floor)?;
        let erosion_delta = exact("erosion_delta", self.erosion_delta)?;

        self.validate()
            .map_err(|errors| first_violation(&errors, self))?;

        let mut baselines = BTreeMap::new();
        for (key, margin) in &self.baselines {
            let parameter = format!("baselines.{}", key);
            let parsed: DimensionKey = key.parse().map_err(|_| RuleConfigError {
                parameter: parameter.clone(),
                value: key.clone(),
                reason: "not a dimension key (expected e.g. region=West)".into(),
            })?;
            baselines.insert(parsed, exact(&parameter, *margin)?);
        }

        Ok(LeakageRules {
            discount_threshold,
            margin_floor,
            erosion_delta,
            rounding_places: self.rounding_places,
            baselines,
        })
    }

    fn value_of(&self, parameter: &str) -> String {
        match parameter {
            "discount_threshold" => self.discount_threshold.to_string(),
            "margin_floor" => self.margin_floor.to_string(),
            "erosion_delta" => self.erosion_delta.to_string(),
            "rounding_places" => self.rounding_places.to_string(),
            _ => "?".to_string(),
        }
    }
}

fn exact(parameter: &str, value: f64) -> Result<Decimal, RuleConfigError> {
    if !value.is_finite() {
        return Err(RuleConfigError {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: "must be a finite number".into(),
        });
    }
    Decimal::try_from(value).map_err(|e| RuleConfigError {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn first_violation(errors: &ValidationErrors, config: &RuleConfig) -> RuleConfigError {
    let mut fields: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let reason = errs
                .first()
                .map(|e| describe_range(e.code.as_ref(), &e.params))
                .unwrap_or_else(|| "invalid".to_string());
            (field.to_string(), reason)
        })
        .collect();
    fields.sort();

    match fields.into_iter().next() {
        Some((parameter, reason)) => RuleConfigError {
            value: config.value_of(&parameter),
            parameter,
            reason,
        },
        None => RuleConfigError {
            parameter: "rules".into(),
            value: "?".into(),
            reason: "invalid rule configuration".into(),
        },
    }
}

pub(crate) fn describe_range(
    code: &str,
    params: &std::collections::HashMap<std::borrow::Cow<'static, str>, serde_json::Value>,
) -> String {
    match (params.get("min"), params.get("max")) {
        (Some(min), Some(max)) => format!("must be within [{}, {}]", min, max),
        (Some(min), None) => format!("must be >= {}", min),
        (None, Some(max)) => format!("must be <= {}", max),
        (None, None) => code.to_string(),
    }
}

/// Validated, exact thresholds the detector runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakageRules {
    pub(crate) discount_threshold: Decimal,
    pub(crate) margin_floor: Decimal,
    pub(crate) erosion_delta: Decimal,
    pub(crate) rounding_places: u32,
    pub(crate) baselines: BTreeMap<DimensionKey, Decimal>,
}

impl LeakageRules {
    pub fn rounding_places(&self) -> u32 {
        self.rounding_places
    }

    /// Fills missing baselines with the whole-range margins of a prior sealed report.
    /// Configured baselines win over report-derived ones.
    pub fn with_report_baselines(mut self, report: &ValidationReport) -> Self {
        for set in report.kpi_sets() {
            if set.bucket != Bucket::All {
                continue;
            }
            if let Some(margin) = set.profit_margin {
                self.baselines.entry(set.key.clone()).or_insert(margin);
            }
        }
        self
    }

    pub fn baseline_for(&self, key: &DimensionKey) -> Option<Decimal> {
        self.baselines
            .iter()
            .find(|(k, _)| k.same_pairs(key))
            .map(|(_, v)| *v)
    }
}
