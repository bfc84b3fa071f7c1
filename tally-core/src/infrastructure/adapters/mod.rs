// tally-core/src/infrastructure/adapters/mod.rs

pub mod duckdb;
pub mod json;

pub use self::duckdb::DuckDbRowSource;
pub use json::JsonRowSource;

use std::path::Path;

use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::RowSource;

/// Picks the row source for `path` by extension.
pub fn source_for(path: &Path) -> Result<Box<dyn RowSource>, InfrastructureError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") | Some("tsv") => Ok(Box::new(DuckDbRowSource::new(path)?)),
        Some("json") => Ok(Box::new(JsonRowSource::new(path))),
        _ => Err(InfrastructureError::UnsupportedInput(path.display().to_string())),
    }
}
