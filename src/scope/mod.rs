//! Scope stack (spec.md §4.3, "C3" in the system overview).
//!
//! Tracks nested visibility of tables/columns/aliases across correlated
//! subqueries and CTEs. A frame is pushed for every node that opens a new
//! naming scope (typically a `Project` or `Filter` directly above a join
//! tree, or a `SubqueryAlias` body).

pub mod alias;
pub mod errors;
pub mod filter_set;

pub use alias::{AliasTarget, TableAliasMap};
pub use errors::ScopeError;
pub use filter_set::FilterSet;

use std::any::Any;
use std::collections::HashMap;

use crate::plan::{LogicalPlan, ScalarExpr, Schema};

/// One enclosing logical context: the plan node that opened it, its
/// visible output schema, its alias map, and a scratch memo cache for
/// sharing artifacts computed once per scope between rules.
pub struct Frame {
    pub opened_by: Option<LogicalPlan>,
    pub visible_schema: Schema,
    pub aliases: TableAliasMap,
    memo: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("visible_schema", &self.visible_schema)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl Frame {
    pub fn new(visible_schema: Schema) -> Self {
        Frame {
            opened_by: None,
            visible_schema,
            aliases: TableAliasMap::new(),
            memo: HashMap::new(),
        }
    }

    pub fn memoize<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.memo.insert(key.into(), Box::new(value));
    }

    pub fn lookup<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.memo.get(key).and_then(|v| v.downcast_ref::<T>())
    }
}

/// The result of resolving an unqualified/qualified column reference
/// against the scope stack (spec.md §4.3 "Visibility rule").
pub enum ColumnLookup {
    Resolved { frame_depth: usize, index: usize, descriptor_index: usize },
    Deferred,
}

/// A stack of [`Frame`]s, outer to inner. Pushing is functional: it returns
/// a new stack sharing the outer frames, matching spec.md's
/// `push(node) -> scope'`.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Frames ordered outer to inner (spec.md `outer_to_inner() -> [node]`).
    pub fn outer_to_inner(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Visibility rule (spec.md §4.3): consult the innermost scope first;
    /// ambiguous within that scope is an error; not found there walks
    /// outward; still not found and qualified is a not-found error;
    /// unqualified falls through to `DeferredColumn`.
    pub fn resolve_unqualified(&self, name: &str) -> Result<ColumnLookup, ScopeError> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            let matches = frame.visible_schema.find_by_name(name);
            match matches.len() {
                0 => continue,
                1 => {
                    let (idx, _) = matches[0];
                    return Ok(ColumnLookup::Resolved {
                        frame_depth: depth,
                        index: idx,
                        descriptor_index: idx,
                    });
                }
                _ => return Err(ScopeError::AmbiguousColumnName(name.to_string())),
            }
        }
        Ok(ColumnLookup::Deferred)
    }

    pub fn resolve_qualified(&self, table: &str, name: &str) -> Result<ColumnLookup, ScopeError> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            if let Some((idx, _)) = frame.visible_schema.find_by_table_and_name(table, name) {
                return Ok(ColumnLookup::Resolved {
                    frame_depth: depth,
                    index: idx,
                    descriptor_index: idx,
                });
            }
            if frame.aliases.contains(table) {
                return Err(ScopeError::TableColumnNotFound(table.to_string(), name.to_string()));
            }
        }
        Err(ScopeError::TableNotFound(table.to_string()))
    }

    /// Resolve `table` to its underlying alias target, walking outward.
    pub fn resolve_alias(&self, table: &str) -> Option<&AliasTarget> {
        self.frames.iter().rev().find_map(|f| f.aliases.get(table))
    }
}

/// Wraps an expression that could not be resolved this pass into a
/// `DeferredColumn` (spec.md GLOSSARY).
pub fn defer(name: &str, table: Option<&str>) -> ScalarExpr {
    ScalarExpr::DeferredColumn {
        name: name.to_string(),
        table: table.map(|t| t.to_string()),
    }
}
