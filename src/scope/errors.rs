use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScopeError {
    #[error("column reference '{0}' is ambiguous in the current scope")]
    AmbiguousColumnName(String),

    #[error("alias or table '{0}' is already defined in the current scope")]
    DuplicateAliasOrTable(String),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("table '{0}' has no column '{1}'")]
    TableColumnNotFound(String, String),

    #[error("table '{0}' not found in current scope")]
    TableNotFound(String),
}
