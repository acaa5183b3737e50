use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("plan contains an unresolved node or expression after a full analysis pass")]
    NotFullyResolved,

    #[error(transparent)]
    UnresolvedColumn(#[from] crate::resolver::ResolverError),

    #[error("ORDER BY expression at position {0} does not appear in the SELECT list and the query is not a simple scan")]
    OrderByNotInSelectList(usize),

    #[error("column '{0}' must either appear in the GROUP BY clause or be wrapped in an aggregate function")]
    NotGroupedOrAggregated(String),

    #[error("UNION branches have mismatched arity: {left} vs {right}")]
    UnionArityMismatch { left: usize, right: usize },

    #[error("comparison between incompatible types {left:?} and {right:?}")]
    IncompatibleComparisonTypes {
        left: crate::plan::expr::SqlType,
        right: crate::plan::expr::SqlType,
    },

    #[error("aggregate function '{0}' used outside of a GroupBy or HAVING context")]
    AggregateOutsideGroupBy(String),

    #[error("CHECK constraint '{0}' failed type validation")]
    InvalidCheckConstraint(String),

    #[error("scalar subquery must project exactly one column, found {0}")]
    SubqueryMultipleColumns(usize),
}
