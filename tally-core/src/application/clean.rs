// tally-core/src/application/clean.rs

use crate::error::TallyError;
use crate::infrastructure::config::project::load_project_config;
use crate::infrastructure::error::InfrastructureError;
use std::fs;
use std::path::{Component, Path};

/// Removes the project's clean targets. Returns the targets actually removed.
pub fn clean_project(project_dir: &Path) -> Result<Vec<String>, TallyError> {
    tracing::info!("Cleaning project artifacts");

    let config = load_project_config(project_dir).map_err(TallyError::Infrastructure)?;

    let targets = if config.clean_targets.is_empty() {
        vec![config.target_path.clone()]
    } else {
        config.clean_targets
    };

    let mut removed = Vec::new();
    for target_rel_path in targets {
        let rel = Path::new(&target_rel_path);
        let escapes = rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(TallyError::UnsafePath(target_rel_path));
        }

        let full_path = project_dir.join(rel);
        if full_path.exists() {
            if full_path.is_dir() {
                fs::remove_dir_all(&full_path).map_err(InfrastructureError::Io)?;
            } else {
                fs::remove_file(&full_path).map_err(InfrastructureError::Io)?;
            }
            tracing::info!(target = %target_rel_path, "Artifact removed");
            removed.push(target_rel_path);
        }
    }

    Ok(removed)
}
