// tally-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(tally::infra::database::duckdb),
        help("DuckDB could not scan the input. Check that the file is a readable CSV.")
    )]
    DuckDB(#[from] duckdb::Error),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    #[error("File System Error: {0}")]
    #[diagnostic(
        code(tally::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(tally::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(
        code(tally::infra::json),
        help("Input rows must be a JSON array of objects; reports must be produced by `tally run`.")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(tally::infra::config_missing))]
    ConfigNotFound(String),

    #[error("Unsupported input '{0}'")]
    #[diagnostic(
        code(tally::infra::input),
        help("Use a .csv or .json file.")
    )]
    UnsupportedInput(String),

    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(tally::infra::template),
        help("Check the Jinja syntax of the gateway templates.")
    )]
    TemplateError(#[from] minijinja::Error),
}

impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}
