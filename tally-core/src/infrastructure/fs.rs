// tally-core/src/infrastructure/fs.rs

use crate::domain::guard::ValidationReport;
use crate::infrastructure::error::InfrastructureError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument};

/// Writes `content` to a temporary file next to `path`, then renames it into place.
/// Readers see either the old file or the complete new one.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(InfrastructureError::Io)?;

    temp_file
        .write_all(content.as_ref())
        .map_err(InfrastructureError::Io)?;

    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Serializes a sealed report as pretty JSON and writes it atomically.
#[instrument(skip(report), fields(hash = %report.content_hash()))]
pub fn save_report(path: &Path, report: &ValidationReport) -> Result<(), InfrastructureError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    atomic_write(path, json)?;
    info!(path = %path.display(), generation = report.generation(), "Report written");
    Ok(())
}

/// Loads a report; fails if its content no longer matches its hash.
pub fn load_report(path: &Path) -> Result<ValidationReport, InfrastructureError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::guard::ValidationGuard;
    use crate::domain::metrics::{TimeBucket, compute};
    use crate::domain::record::transaction::fixtures::{line, record};
    use anyhow::Result;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("report.json");
        let content = "{}";

        atomic_write(&file_path, content)?;

        assert!(file_path.exists());
        let read_content = fs::read_to_string(file_path)?;
        assert_eq!(read_content, content);
        Ok(())
    }

    #[test]
    fn test_atomic_write_overwrites_existing() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("report.json");

        atomic_write(&file_path, "generation 0")?;
        atomic_write(&file_path, "generation 1")?;

        let read_content = fs::read_to_string(file_path)?;
        assert_eq!(read_content, "generation 1");
        Ok(())
    }

    #[test]
    fn test_report_round_trip_and_tamper_detection() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("target/report.json");
        let records = vec![record(line("o1", dec!(20), dec!(-5)))];
        let sets = compute(&records, &[], TimeBucket::None, 4);
        let report = ValidationGuard::new(4).seal(sets, vec![])?;

        save_report(&path, &report)?;
        assert_eq!(load_report(&path)?, report);

        let edited = fs::read_to_string(&path)?.replace("\"-5\"", "\"5\"");
        fs::write(&path, edited)?;
        let err = load_report(&path).err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("integrity"), "{}", err);
        Ok(())
    }
}
