// tally-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use duckdb::{Config, Connection};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

use crate::domain::record::RawRow;
use crate::error::TallyError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::RowSource;

const VIEW_NAME: &str = "raw_rows";

/// Reads a CSV file through DuckDB's `read_csv_auto`, every cell as text.
/// Typing is left to the normalizer.
pub struct DuckDbRowSource {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl DuckDbRowSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, InfrastructureError> {
        let conn = Connection::open_in_memory_with_flags(Config::default())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.as_ref().to_path_buf(),
        })
    }

    fn read_all(&self) -> Result<Vec<RawRow>, InfrastructureError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| InfrastructureError::Io(std::io::Error::other("DuckDB Mutex Poisoned")))?;

        let escaped = self.path.to_string_lossy().replace('\'', "''");
        conn.execute(
            &format!(
                "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_csv_auto('{}', all_varchar=true)",
                VIEW_NAME, escaped
            ),
            [],
        )?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_info('{}')", VIEW_NAME))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>("name"))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(columns = ?columns, "CSV columns discovered");

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", VIEW_NAME))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut raw = RawRow::new();
            for (i, name) in columns.iter().enumerate() {
                let cell: Option<String> = row.get(i)?;
                raw.insert(name.clone(), cell.map_or(Value::Null, Value::String));
            }
            out.push(raw);
        }
        Ok(out)
    }
}

#[async_trait]
impl RowSource for DuckDbRowSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, TallyError> {
        Ok(self.read_all()?)
    }

    fn source_name(&self) -> &str {
        "duckdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_csv_rows_come_back_as_text() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("orders.csv");
        fs::write(
            &path,
            "Row ID,Order ID,Sales,Discount\n1,CA-1,200.50,0.2\n2,CA-2,,0\n",
        )?;

        let rows = DuckDbRowSource::new(&path)?.fetch_rows().await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Order ID"), Some(&Value::String("CA-1".into())));
        assert_eq!(rows[0].get("Sales"), Some(&Value::String("200.50".into())));
        assert_eq!(rows[1].get("Sales"), Some(&Value::Null));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_a_database_error() -> Result<()> {
        let dir = tempdir()?;
        let source = DuckDbRowSource::new(dir.path().join("nope.csv"))?;
        let res = source.fetch_rows().await;
        assert!(matches!(
            res,
            Err(TallyError::Infrastructure(InfrastructureError::Database(_)))
        ));
        Ok(())
    }
}
