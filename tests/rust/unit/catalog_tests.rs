use query_analyzer::catalog::memory::MemoryCatalog;
use query_analyzer::catalog::{Catalog, CatalogError, SessionContext, Table};
use query_analyzer::plan::expr::SqlType;
use query_analyzer::plan::{ColumnDescriptor, Schema};

fn users_table() -> Table {
    let mut schema = Schema::empty();
    schema.push(ColumnDescriptor::new("id", SqlType::Int64, false));
    Table {
        database: "db".into(),
        name: "users".into(),
        schema,
        foreign_keys: None,
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    }
}

#[test]
fn looks_up_a_registered_table() {
    let catalog = MemoryCatalog::new();
    catalog.add_database("db");
    catalog.add_table(users_table());

    let session = SessionContext::new(Some("db".into()));
    let table = catalog.table(&session, "db", "users").unwrap();
    assert_eq!(table.name, "users");
    assert_eq!(table.schema.arity(), 1);
}

#[test]
fn missing_table_surfaces_table_not_found() {
    let catalog = MemoryCatalog::new();
    catalog.add_database("db");
    let session = SessionContext::new(Some("db".into()));

    let err = catalog.table(&session, "db", "ghost").unwrap_err();
    assert_eq!(
        err,
        CatalogError::TableNotFound { database: "db".into(), table: "ghost".into() }
    );
}

#[test]
fn indexes_for_unknown_table_returns_empty() {
    let catalog = MemoryCatalog::new();
    assert!(catalog.indexes_for("db", "ghost").is_empty());
}
