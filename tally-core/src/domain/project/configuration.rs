// tally-core/src/domain/project/configuration.rs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::error::RuleConfigError;
use crate::domain::leakage::RuleConfig;
use crate::domain::metrics::TimeBucket;
use crate::domain::record::{Dimension, InvalidRowPolicy};

pub const REPORT_FILE: &str = "report.json";

/// How records are grouped and what happens to rows that fail validation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnalysisSettings {
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<Dimension>,

    #[serde(default)]
    pub time_bucket: TimeBucket,

    #[serde(default)]
    pub on_invalid_row: InvalidRowPolicy,

    /// Aggregate on the rayon pool instead of a single pass.
    #[serde(default)]
    pub parallel: bool,

    #[serde(default = "default_risk_dimension")]
    pub risk_dimension: Dimension,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            time_bucket: TimeBucket::default(),
            on_invalid_row: InvalidRowPolicy::default(),
            parallel: false,
            risk_dimension: default_risk_dimension(),
        }
    }
}

impl AnalysisSettings {
    pub fn check(&self) -> Result<(), RuleConfigError> {
        for (i, d) in self.dimensions.iter().enumerate() {
            if self.dimensions[..i].contains(d) {
                return Err(RuleConfigError {
                    parameter: "dimensions".into(),
                    value: d.to_string(),
                    reason: "listed more than once".into(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,

    /// Input file relative to the project root (`.csv` or `.json`).
    #[serde(default)]
    pub source: Option<String>,

    #[serde(rename = "config-paths", default)]
    pub config_paths: Vec<String>,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    #[serde(rename = "clean-targets", default = "default_clean_targets")]
    pub clean_targets: Vec<String>,

    #[serde(default)]
    pub analysis: AnalysisSettings,

    #[serde(default)]
    pub rules: RuleConfig,
}

impl ProjectConfig {
    pub fn report_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.target_path).join(REPORT_FILE)
    }
}

fn default_dimensions() -> Vec<Dimension> {
    vec![Dimension::Region, Dimension::Category]
}
fn default_risk_dimension() -> Dimension {
    Dimension::Category
}
fn default_clean_targets() -> Vec<String> {
    vec!["target".to_string()]
}
fn default_target_path() -> String {
    "target".to_string()
}
fn default_version() -> String {
    "1.0.0".to_string()
}
