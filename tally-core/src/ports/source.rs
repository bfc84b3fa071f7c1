// tally-core/src/ports/source.rs

// What the pipeline needs from an input: ordered raw rows.
// Adapters (DuckDB CSV scan, JSON array) live in infrastructure.

use crate::domain::record::RawRow;
use crate::error::TallyError;
use async_trait::async_trait;

#[async_trait]
pub trait RowSource: Send + Sync {
    /// Every row of the source, in source order.
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, TallyError>;

    /// Short label for logs (`duckdb`, `json`).
    fn source_name(&self) -> &str;
}
