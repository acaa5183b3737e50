use thiserror::Error;

use crate::rules::RuleError;
use crate::validate::ValidationError;

/// Top-level error type returned by [`crate::analyzer::Analyzer`] (spec.md
/// §6), wrapping every component error the pipeline can surface.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyzerError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("prepared statement analysis is disabled by configuration")]
    PreparedStatementsDisabled,
}
