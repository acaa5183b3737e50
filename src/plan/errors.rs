use thiserror::Error;

/// Errors raised by the plan & expression model itself (spec.md §4.1 edge
/// cases), as opposed to errors raised by a specific rule or validator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    #[error("with_children called with {given} children, expected {expected}")]
    ArityMismatch { expected: usize, given: usize },

    #[error("with_expressions called with {given} expressions, expected {expected}")]
    ExpressionArityMismatch { expected: usize, given: usize },
}
