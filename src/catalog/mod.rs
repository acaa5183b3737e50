//! Catalog interface (spec.md §4.2, "C2" in the system overview).
//!
//! The analyzer never talks to the storage engine directly: every lookup
//! goes through the [`Catalog`] trait, and every optional per-table
//! capability (foreign keys, index addressing, filter/projection pushdown)
//! is probed through a getter on [`Table`] rather than a concrete type
//! check, exactly as spec.md §9 ("Tagged variants vs. open polymorphism")
//! prescribes for the genuinely open parts of the model.

pub mod errors;
mod session;

pub use errors::CatalogError;
pub use session::SessionContext;

use crate::plan::{ColumnDescriptor, ScalarExpr, Schema};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub name: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub is_aggregate: bool,
    pub min_args: usize,
    pub max_args: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub database: String,
    pub name: String,
    /// The view's stored, unresolved body. Temporal (`AS OF`) bindings at
    /// the call site are propagated into every `UnresolvedTable` inside
    /// this body by the view-resolution rule (spec.md §4.4 bullet 1).
    pub body: crate::plan::LogicalPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub id: String,
    pub database: String,
    pub table: String,
    /// Normalized index key expressions, with aliases stripped (spec.md §8
    /// invariant 5, "Alias normalization").
    pub expressions: Vec<ScalarExpr>,
    pub unique: bool,
}

impl IndexDef {
    /// Whether this index's leading columns can serve the given range
    /// predicates (spec.md §4.2 `Index::can_support`). A real cost-based
    /// implementation would inspect selectivity; this one checks that the
    /// predicate set covers a non-empty, order-respecting prefix of the
    /// index's key expressions.
    pub fn can_support(&self, ranges: &[ScalarExpr]) -> bool {
        !self.expressions.is_empty()
            && self
                .expressions
                .iter()
                .take(ranges.len().max(1))
                .any(|key| ranges.iter().any(|r| r.referenced_tables().is_empty() || *r == *key))
    }

    /// Longest prefix of `self.expressions` whose columns are all present
    /// in `available`. Used by foreign-key planning to find a parent index
    /// covering the referenced columns (spec.md §4.6.1).
    pub fn longest_covering_prefix(&self, available: &[String]) -> usize {
        let mut n = 0;
        for expr in &self.expressions {
            let covers = match expr {
                ScalarExpr::GetField { name, .. } => available.iter().any(|c| c.eq_ignore_ascii_case(name)),
                _ => false,
            };
            if !covers {
                break;
            }
            n += 1;
        }
        n
    }
}

/// Optional capability: a table that declares foreign keys, both as the
/// child (`declared`) and as a parent referenced by others (`referenced`).
pub trait ForeignKeyTable {
    fn declared_foreign_keys(&self) -> &[crate::plan::ForeignKeyDef];
    fn referenced_foreign_keys(&self) -> &[crate::plan::ForeignKeyDef];
}

/// Optional capability: a table whose storage engine can perform an
/// indexed point/range lookup directly.
pub trait IndexAddressableTable {
    fn indexes(&self) -> &[IndexDef];
}

/// Optional capability: a table that can accept a pushed-down filter
/// instead of having the analyzer keep a `Filter` node above the scan.
pub trait FilteredTable {
    fn with_pushed_filter(&self, predicate: &ScalarExpr) -> bool;
}

/// Optional capability: a table that can accept column pruning instead of
/// always returning every column.
pub trait ProjectedTable {
    fn with_pushed_projection(&self, columns: &[String]) -> bool;
}

/// A concrete table object as returned by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub database: String,
    pub name: String,
    pub schema: Schema,
    pub foreign_keys: Option<TableForeignKeys>,
    pub indexes: Vec<IndexDef>,
    pub check_constraints: Vec<crate::plan::CheckConstraint>,
    pub auto_increment_column: Option<String>,
    pub has_delete_trigger: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableForeignKeys {
    pub declared: Vec<crate::plan::ForeignKeyDef>,
    pub referenced: Vec<crate::plan::ForeignKeyDef>,
}

impl Table {
    pub fn column_names(&self) -> Vec<String> {
        self.schema.columns().iter().map(|c| c.name.clone()).collect()
    }

    pub fn as_foreign_key_table(&self) -> Option<&dyn ForeignKeyTable> {
        self.foreign_keys.as_ref().map(|fks| fks as &dyn ForeignKeyTable)
    }

    pub fn as_index_addressable(&self) -> Option<&dyn IndexAddressableTable> {
        if self.indexes.is_empty() {
            None
        } else {
            Some(self as &dyn IndexAddressableTable)
        }
    }
}

impl ForeignKeyTable for TableForeignKeys {
    fn declared_foreign_keys(&self) -> &[crate::plan::ForeignKeyDef] {
        &self.declared
    }
    fn referenced_foreign_keys(&self) -> &[crate::plan::ForeignKeyDef] {
        &self.referenced
    }
}

impl IndexAddressableTable for Table {
    fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }
}

/// The catalog interface (spec.md §4.2).
///
/// `#[cfg_attr(test, mockall::automock)]` gives every rule/resolver test a
/// drop-in mock catalog instead of a hand-rolled stand-in (spec.md §10.4).
#[cfg_attr(test, mockall::automock)]
pub trait Catalog: Send + Sync {
    fn database(&self, ctx: &SessionContext, name: &str) -> CatalogResult<Database>;
    fn table(&self, ctx: &SessionContext, database: &str, table: &str) -> CatalogResult<Table>;
    fn function(&self, name: &str) -> CatalogResult<FunctionSignature>;
    fn view(&self, database: &str, name: &str) -> CatalogResult<ViewDefinition>;
    fn indexes_for(&self, database: &str, table: &str) -> Vec<IndexDef>;
    fn all_databases(&self) -> Vec<Database>;
}

/// An in-memory catalog used by tests and the CLI driver's fixtures. Mirrors
/// the shape `clickgraph`'s `GraphSchema` plays for its own domain: a
/// process-shared, read-mostly registry behind a lock (spec.md §5 "Shared
/// resources").
pub mod memory {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MemoryCatalog {
        databases: RwLock<HashMap<String, Database>>,
        tables: RwLock<HashMap<(String, String), Table>>,
        views: RwLock<HashMap<(String, String), ViewDefinition>>,
        functions: RwLock<HashMap<String, FunctionSignature>>,
    }

    impl MemoryCatalog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_database(&self, name: impl Into<String>) {
            let name = name.into();
            self.databases.write().insert(
                name.clone(),
                Database {
                    name,
                    read_only: false,
                },
            );
        }

        pub fn add_table(&self, table: Table) {
            self.tables
                .write()
                .insert((table.database.clone(), table.name.clone()), table);
        }

        pub fn add_view(&self, view: ViewDefinition) {
            self.views
                .write()
                .insert((view.database.clone(), view.name.clone()), view);
        }

        pub fn add_function(&self, f: FunctionSignature) {
            self.functions.write().insert(f.name.clone(), f);
        }
    }

    impl Catalog for MemoryCatalog {
        fn database(&self, _ctx: &SessionContext, name: &str) -> CatalogResult<Database> {
            self.databases
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| CatalogError::DatabaseNotFound(name.to_string()))
        }

        fn table(&self, _ctx: &SessionContext, database: &str, table: &str) -> CatalogResult<Table> {
            self.tables
                .read()
                .get(&(database.to_string(), table.to_string()))
                .cloned()
                .ok_or_else(|| CatalogError::TableNotFound {
                    database: database.to_string(),
                    table: table.to_string(),
                })
        }

        fn function(&self, name: &str) -> CatalogResult<FunctionSignature> {
            self.functions
                .read()
                .get(&name.to_ascii_lowercase())
                .cloned()
                .ok_or_else(|| CatalogError::FunctionNotFound(name.to_string()))
        }

        fn view(&self, database: &str, name: &str) -> CatalogResult<ViewDefinition> {
            self.views
                .read()
                .get(&(database.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| CatalogError::ViewNotFound {
                    database: database.to_string(),
                    name: name.to_string(),
                })
        }

        fn indexes_for(&self, database: &str, table: &str) -> Vec<IndexDef> {
            self.tables
                .read()
                .get(&(database.to_string(), table.to_string()))
                .map(|t| t.indexes.clone())
                .unwrap_or_default()
        }

        fn all_databases(&self) -> Vec<Database> {
            self.databases.read().values().cloned().collect()
        }
    }
}

/// Helper used by table-resolution to turn a catalog `Table` into a
/// `ResolvedTable` plan node.
pub fn resolved_table_from(table: &Table, as_of: Option<ScalarExpr>) -> crate::plan::LogicalPlan {
    let mut schema = table.schema.clone();
    for c in schema.0.iter_mut() {
        c.source_table = Some(table.name.clone());
    }
    crate::plan::LogicalPlan::ResolvedTable {
        database: table.database.clone(),
        name: table.name.clone(),
        schema,
        as_of,
        check_constraints: table.check_constraints.clone(),
    }
}

pub fn column_descriptor(name: &str, sql_type: crate::plan::expr::SqlType, nullable: bool) -> ColumnDescriptor {
    ColumnDescriptor::new(name, sql_type, nullable)
}
