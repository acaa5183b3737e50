//! Session-local state threaded through the analyzer context (spec.md §6
//! "A context exposing...").

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::plan::expr::Literal;

/// Cooperative cancellation, checked between batches (spec.md §5
/// "Cancellation"). Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A warning collected during analysis (e.g. "batch iteration cap reached").
/// Cleared by the once-after-all "clear warnings" pass (spec.md §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
}

/// Session-local state: current database, user/session variables, the
/// warnings sink, cancellation, and a tracing span stack (spec.md §6).
/// Mutated only by the session that owns it (spec.md §5 "Shared
/// resources").
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub current_database: Option<String>,
    pub user: Option<String>,
    session_variables: HashMap<String, Literal>,
    user_variables: HashMap<String, Literal>,
    pub warnings: Vec<Warning>,
    pub cancellation: CancellationToken,
    pub span_stack: Vec<String>,
    pub autocommit: bool,
    pub foreign_key_checks: bool,
    pub sql_mode_relaxed_group_by: bool,
}

impl SessionContext {
    pub fn new(current_database: Option<String>) -> Self {
        Self {
            current_database,
            autocommit: true,
            foreign_key_checks: true,
            ..Default::default()
        }
    }

    pub fn session_variable(&self, name: &str) -> Option<&Literal> {
        self.session_variables.get(&name.to_ascii_lowercase())
    }

    pub fn set_session_variable(&mut self, name: &str, value: Literal) {
        self.session_variables.insert(name.to_ascii_lowercase(), value);
        match name.to_ascii_lowercase().as_str() {
            "autocommit" => self.autocommit = !matches!(self.session_variables.get("autocommit"), Some(Literal::Int64(0)) | Some(Literal::Boolean(false))),
            "foreign_key_checks" => {
                self.foreign_key_checks = !matches!(
                    self.session_variables.get("foreign_key_checks"),
                    Some(Literal::Int64(0)) | Some(Literal::Boolean(false))
                )
            }
            _ => {}
        }
    }

    pub fn user_variable(&self, name: &str) -> Option<&Literal> {
        self.user_variables.get(&name.to_ascii_lowercase())
    }

    pub fn set_user_variable(&mut self, name: &str, value: Literal) {
        self.user_variables.insert(name.to_ascii_lowercase(), value);
    }

    pub fn push_warning(&mut self, code: &'static str, message: impl Into<String>) {
        self.warnings.push(Warning {
            code,
            message: message.into(),
        });
    }

    pub fn push_span(&mut self, name: impl Into<String>) {
        self.span_stack.push(name.into());
    }

    pub fn pop_span(&mut self) {
        self.span_stack.pop();
    }
}
