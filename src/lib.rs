//! Query analyzer: turns an unresolved logical SQL plan into a fully
//! resolved, type-checked, optimized logical plan through
//! - Catalog-driven name resolution (tables, views, columns, functions)
//! - A staged, fixed-point rule engine (predicate pushdown, join
//!   reordering, index selection, foreign-key planning, ...)
//! - Post-rewrite validation of the resolved tree

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod plan;
pub mod resolver;
pub mod rules;
pub mod scope;
pub mod validate;
