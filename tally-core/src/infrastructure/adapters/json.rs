// tally-core/src/infrastructure/adapters/json.rs

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::domain::record::RawRow;
use crate::error::TallyError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::RowSource;

/// Reads a JSON array of objects.
pub struct JsonRowSource {
    path: PathBuf,
}

impl JsonRowSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RowSource for JsonRowSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, TallyError> {
        let content = fs::read_to_string(&self.path)?;
        let rows: Vec<RawRow> =
            serde_json::from_str(&content).map_err(InfrastructureError::JsonError)?;
        Ok(rows)
    }

    fn source_name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_array_of_objects() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("orders.json");
        fs::write(&path, r#"[{"Order ID": "CA-1", "Sales": 12.5}, {"Order ID": "CA-2"}]"#)?;

        let rows = JsonRowSource::new(&path).fetch_rows().await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Sales"), Some(&json!(12.5)));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_array_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("orders.json");
        fs::write(&path, r#"{"Order ID": "CA-1"}"#)?;
        let res = JsonRowSource::new(&path).fetch_rows().await;
        assert!(matches!(
            res,
            Err(TallyError::Infrastructure(InfrastructureError::JsonError(_)))
        ));
        Ok(())
    }
}
