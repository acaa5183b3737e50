use thiserror::Error;

use crate::catalog::CatalogError;
use crate::scope::ScopeError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolverError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("a view with an existing AS OF binding cannot be re-bound to another AS OF expression")]
    IncompatibleAsOf,

    #[error("ORDER BY column index {index} is out of range for a projection of arity {arity}")]
    OrderByColumnIndex { index: i64, arity: usize },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("unknown column qualifier '{0}' in star expansion")]
    UnknownStarQualifier(String),

    #[error("a column reference remained unresolved after a full default-rules pass: {0}")]
    TableColumnNotFound(String),
}
