// tally-core/src/infrastructure/config/project.rs

use serde::{Deserialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::domain::leakage::RuleConfig;
use crate::domain::project::configuration::ProjectConfig;
use crate::domain::record::InvalidRowPolicy;
use crate::infrastructure::error::InfrastructureError;

pub const CONFIG_CANDIDATES: [&str; 2] = ["tally_project.yaml", "tally.yaml"];

/// Loads `tally.yaml`, layers the satellite `rules.yml` and environment overrides on top.
#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project config");

    let mut config: ProjectConfig = load_fragment(&config_path)?;

    if let Some(config_folder) = config.config_paths.first() {
        let config_dir = project_dir.join(config_folder);
        if config_dir.exists() {
            load_satellite_configs(&mut config, &config_dir)?;
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CONFIG_CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CONFIG_CANDIDATES
    )))
}

fn load_fragment<T: DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        InfrastructureError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn load_satellite_configs(
    config: &mut ProjectConfig,
    config_dir: &Path,
) -> Result<(), InfrastructureError> {
    let rules_path = config_dir.join("rules.yml");
    if rules_path.exists() {
        #[derive(Deserialize)]
        struct RulesWrapper {
            rules: RuleConfig,
        }

        let wrapper: RulesWrapper = load_fragment(&rules_path)?;
        config.rules = wrapper.rules;
        info!(path = ?rules_path, "Leakage rules loaded");
    }
    Ok(())
}

/// `TALLY_TARGET_PATH` and `TALLY_ON_INVALID_ROW` win over the file.
fn apply_env_overrides<F>(config: &mut ProjectConfig, var: F) -> Result<(), InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = var("TALLY_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Some(val) = var("TALLY_ON_INVALID_ROW") {
        let policy: InvalidRowPolicy = val.parse().map_err(|_| {
            InfrastructureError::ConfigError(format!(
                "TALLY_ON_INVALID_ROW must be abort, skip or collect_errors (got '{}')",
                val
            ))
        })?;
        info!(old = %config.analysis.on_invalid_row, new = %policy, "Overriding invalid-row policy via ENV");
        config.analysis.on_invalid_row = policy;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let res = load_project_config(dir.path());
        assert!(matches!(res, Err(InfrastructureError::ConfigNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_satellite_rules_override_the_main_file() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("tally.yaml"),
            "name: shop\nconfig-paths: [config]\nrules:\n  discount_threshold: 0.5\n",
        )?;
        fs::create_dir(dir.path().join("config"))?;
        fs::write(
            dir.path().join("config/rules.yml"),
            "rules:\n  discount_threshold: 0.25\n  margin_floor: 0.05\n",
        )?;

        let config = load_project_config(dir.path())?;
        assert_eq!(config.rules.discount_threshold, 0.25);
        assert_eq!(config.rules.margin_floor, 0.05);
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let mut config: ProjectConfig = serde_yaml::from_str("name: shop\n")?;
        apply_env_overrides(&mut config, |key| match key {
            "TALLY_TARGET_PATH" => Some("/tmp/out".into()),
            "TALLY_ON_INVALID_ROW" => Some("skip".into()),
            _ => None,
        })?;
        assert_eq!(config.target_path, "/tmp/out");
        assert_eq!(config.analysis.on_invalid_row, InvalidRowPolicy::Skip);

        let bad = apply_env_overrides(&mut config, |key| {
            (key == "TALLY_ON_INVALID_ROW").then(|| "ignore".to_string())
        });
        assert!(matches!(bad, Err(InfrastructureError::ConfigError(_))));
        Ok(())
    }

    #[test]
    fn test_malformed_yaml_is_a_config_error() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("tally.yaml"), "name: [unclosed\n")?;
        assert!(matches!(
            load_project_config(dir.path()),
            Err(InfrastructureError::ConfigError(_))
        ));
        Ok(())
    }
}
