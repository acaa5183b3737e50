use thiserror::Error;

/// Not-found conditions from the catalog interface (spec.md §4.2 "Errors").
/// Typed so rules can recover (defer resolution) instead of unwinding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("table not found: {database}.{table}")]
    TableNotFound { database: String, table: String },

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("view not found: {database}.{name}")]
    ViewNotFound { database: String, name: String },

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("session variable not found: {0}")]
    SessionVariableNotFound(String),

    #[error("no database selected")]
    NoDatabaseSelected,
}
