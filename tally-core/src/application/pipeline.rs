// tally-core/src/application/pipeline.rs

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::TallyError;
use crate::ports::source::RowSource;

use crate::domain::error::{DomainError, SchemaError};
use crate::domain::guard::{ValidationGuard, ValidationReport};
use crate::domain::insights::HealthSummary;
use crate::domain::leakage::LeakageDetector;
use crate::domain::metrics::{compute, compute_parallel};
use crate::domain::project::ProjectConfig;
use crate::domain::record::Normalizer;

use crate::infrastructure::adapters::source_for;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::{load_report, save_report};

#[derive(Debug)]
pub struct AnalysisOutcome {
    pub report: ValidationReport,
    pub rows_seen: usize,
    pub records: usize,
    /// Rows excluded under the `skip` policy.
    pub rejected: Vec<SchemaError>,
}

/// Normalize -> compute -> detect -> summarize -> seal.
///
/// Configuration is validated before the source is read. `previous` continues
/// its generation counter; `baseline` supplies whole-range margins for the
/// erosion rule where the config has none.
#[instrument(skip_all, fields(source = source.source_name()))]
pub async fn run_analysis(
    source: &dyn RowSource,
    config: &ProjectConfig,
    previous: Option<&ValidationReport>,
    baseline: Option<&ValidationReport>,
) -> Result<AnalysisOutcome, TallyError> {
    let analysis = &config.analysis;
    analysis.check().map_err(DomainError::from)?;
    let mut rules = config.rules.validated().map_err(DomainError::from)?;
    if let Some(b) = baseline {
        rules = rules.with_report_baselines(b);
    }
    let places = rules.rounding_places();

    let rows = source.fetch_rows().await?;
    let batch = Normalizer::new(analysis.on_invalid_row).normalize(rows)?;
    for rejected in &batch.rejected {
        warn!(row = rejected.row_index, field = %rejected.field, "Row excluded from analysis");
    }

    let start = Instant::now();
    let kpi_sets = if analysis.parallel {
        compute_parallel(&batch.records, &analysis.dimensions, analysis.time_bucket, places)
    } else {
        compute(&batch.records, &analysis.dimensions, analysis.time_bucket, places)
    };
    let findings = LeakageDetector::new(rules).detect(&batch.records, &kpi_sets)?;
    let summary = HealthSummary::from_records(&batch.records, analysis.risk_dimension, places);
    info!(elapsed = ?start.elapsed(), kpi_sets = kpi_sets.len(), findings = findings.len(), "Metrics computed");

    let mut guard = match previous {
        Some(p) => ValidationGuard::resume(p, places),
        None => ValidationGuard::new(places),
    };
    let report = guard.seal_with_summary(kpi_sets, findings, summary)?;

    Ok(AnalysisOutcome {
        report,
        rows_seen: batch.rows_seen,
        records: batch.records.len(),
        rejected: batch.rejected,
    })
}

/// Options of a project run resolved by the caller.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Overrides `source` from the project config.
    pub input: Option<PathBuf>,
    pub baseline: Option<PathBuf>,
}

/// Runs the analysis of a project directory and writes `<target>/report.json`.
///
/// An existing report at the output path must pass its integrity check; its
/// generation is continued.
#[instrument(skip(config, options))]
pub async fn run_project(
    project_dir: &Path,
    config: &ProjectConfig,
    options: &RunOptions,
) -> Result<(AnalysisOutcome, PathBuf), TallyError> {
    let input = match (&options.input, &config.source) {
        (Some(p), _) => resolve(project_dir, p),
        (None, Some(s)) => resolve(project_dir, Path::new(s)),
        (None, None) => {
            return Err(InfrastructureError::ConfigError(
                "No input: set `source` in tally.yaml or pass --input".into(),
            )
            .into());
        }
    };

    let report_path = config.report_path(project_dir);
    let previous = if report_path.exists() {
        Some(load_report(&report_path)?)
    } else {
        None
    };
    let baseline = match &options.baseline {
        Some(p) => Some(load_report(&resolve(project_dir, p))?),
        None => None,
    };

    let source = source_for(&input)?;
    let outcome = run_analysis(source.as_ref(), config, previous.as_ref(), baseline.as_ref()).await?;
    save_report(&report_path, &outcome.report)?;

    Ok((outcome, report_path))
}

fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
