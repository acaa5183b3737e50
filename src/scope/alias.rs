//! Table alias map (spec.md §3 "Table alias map").
//!
//! Open question (spec.md §9, bullet 1): the source repo carries two
//! slightly different `TableAliases` shapes across revisions. This crate
//! settles on one: an alias always points at the resolved producer node
//! that exposes a `name()`, looked up case-insensitively.

use std::collections::HashMap;

use super::errors::ScopeError;
use crate::plan::{LogicalPlan, Schema};

/// The resolved producer an alias points at (spec.md §9 open question 1).
#[derive(Debug, Clone, PartialEq)]
pub enum AliasTarget {
    Table { database: String, name: String, schema: Schema },
    Subquery { alias: String, schema: Schema },
    IndexedAccess { index_id: String, schema: Schema },
    ValueDerived { alias: String, schema: Schema },
}

impl AliasTarget {
    pub fn name(&self) -> &str {
        match self {
            AliasTarget::Table { name, .. } => name,
            AliasTarget::Subquery { alias, .. } => alias,
            AliasTarget::IndexedAccess { index_id, .. } => index_id,
            AliasTarget::ValueDerived { alias, .. } => alias,
        }
    }

    pub fn schema(&self) -> &Schema {
        match self {
            AliasTarget::Table { schema, .. } => schema,
            AliasTarget::Subquery { schema, .. } => schema,
            AliasTarget::IndexedAccess { schema, .. } => schema,
            AliasTarget::ValueDerived { schema, .. } => schema,
        }
    }

    pub fn from_plan(alias: &str, plan: &LogicalPlan) -> Option<AliasTarget> {
        match plan {
            LogicalPlan::ResolvedTable { database, name, schema, .. } => Some(AliasTarget::Table {
                database: database.clone(),
                name: name.clone(),
                schema: schema.clone(),
            }),
            LogicalPlan::IndexedTableAccess { index_id, schema, .. } => Some(AliasTarget::IndexedAccess {
                index_id: index_id.clone(),
                schema: schema.clone(),
            }),
            LogicalPlan::SubqueryAlias { schema, .. } => Some(AliasTarget::Subquery {
                alias: alias.to_string(),
                schema: schema.clone(),
            }),
            LogicalPlan::Values { schema, .. } => Some(AliasTarget::ValueDerived {
                alias: alias.to_string(),
                schema: schema.clone(),
            }),
            _ => None,
        }
    }
}

/// A case-insensitive alias → resolved-producer map.
#[derive(Debug, Clone, Default)]
pub struct TableAliasMap {
    entries: HashMap<String, AliasTarget>,
}

impl TableAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias within the *same* scope. Duplicate add is a hard error
    /// (spec.md §3 "Table alias map" invariant).
    pub fn insert(&mut self, alias: &str, target: AliasTarget) -> Result<(), ScopeError> {
        let key = alias.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return Err(ScopeError::DuplicateAliasOrTable(alias.to_string()));
        }
        self.entries.insert(key, target);
        Ok(())
    }

    /// Merge aliases visible from an outer scope; silently overwrites,
    /// matching spec.md's "merging from an outer scope silently overwrites".
    pub fn merge_outer(&mut self, outer: &TableAliasMap) {
        for (k, v) in outer.entries.iter() {
            self.entries.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn get(&self, alias: &str) -> Option<&AliasTarget> {
        self.entries.get(&alias.to_ascii_lowercase())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(&alias.to_ascii_lowercase())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
