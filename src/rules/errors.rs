use thiserror::Error;

use crate::catalog::CatalogError;
use crate::resolver::ResolverError;
use crate::scope::ScopeError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Plan(#[from] crate::plan::PlanError),

    #[error("foreign key chain exceeds the configured maximum depth ({max}) at table '{table}'")]
    ForeignKeyDepthExceeded { table: String, max: usize },

    #[error("foreign key chain contains a cycle at table '{table}'")]
    ForeignKeyCycle { table: String },

    #[error("a batch failed to reach a fixed point within {max_iters} iterations")]
    FixedPointNotReached { max_iters: usize },

    #[error("analysis cancelled")]
    Cancelled,
}
