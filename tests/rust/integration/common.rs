use std::sync::Arc;

use query_analyzer::catalog::memory::MemoryCatalog;
use query_analyzer::catalog::{FunctionSignature, IndexDef, Table, TableForeignKeys};
use query_analyzer::plan::expr::SqlType;
use query_analyzer::plan::{ColumnDescriptor, ForeignKeyDef, LogicalPlan, RefAction, ScalarExpr, Schema};

pub fn unresolved_table(name: &str) -> Arc<LogicalPlan> {
    Arc::new(LogicalPlan::UnresolvedTable {
        database: None,
        name: name.into(),
        as_of: None,
    })
}

fn plain_table(name: &str, columns: &[&str]) -> Table {
    let mut schema = Schema::empty();
    for c in columns {
        schema.push(ColumnDescriptor::new(*c, SqlType::Int64, false));
    }
    Table {
        database: "db".into(),
        name: name.into(),
        schema,
        foreign_keys: None,
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    }
}

/// Catalog covering every table spec.md §8's scenarios reference.
pub fn fixture_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.add_database("db");

    catalog.add_table(plain_table("foo", &["a"]));
    catalog.add_table(plain_table("t", &["a", "b"]));
    catalog.add_table(plain_table("t1", &["a", "b", "c"]));
    catalog.add_table(plain_table("t2", &["d", "c", "b", "e"]));

    let fk_orders_customer = ForeignKeyDef {
        name: "fk_orders_customer".into(),
        child_database: "db".into(),
        child_table: "orders".into(),
        columns: vec!["customer_id".into()],
        parent_database: "db".into(),
        parent_table: "customers".into(),
        parent_columns: vec!["id".into()],
        on_delete: RefAction::Cascade,
        on_update: RefAction::NoAction,
    };
    let fk_order_items_order = ForeignKeyDef {
        name: "fk_order_items_order".into(),
        child_database: "db".into(),
        child_table: "order_items".into(),
        columns: vec!["order_id".into()],
        parent_database: "db".into(),
        parent_table: "orders".into(),
        parent_columns: vec!["id".into()],
        on_delete: RefAction::Restrict,
        on_update: RefAction::NoAction,
    };

    let mut customers = plain_table("customers", &["id"]);
    customers.foreign_keys = Some(TableForeignKeys {
        declared: vec![],
        referenced: vec![fk_orders_customer.clone()],
    });
    catalog.add_table(customers);

    let mut orders = plain_table("orders", &["id", "customer_id"]);
    orders.foreign_keys = Some(TableForeignKeys {
        declared: vec![fk_orders_customer],
        referenced: vec![fk_order_items_order.clone()],
    });
    orders.indexes = vec![IndexDef {
        id: "pk_customers".into(),
        database: "db".into(),
        table: "customers".into(),
        expressions: vec![ScalarExpr::GetField {
            index: 0,
            sql_type: SqlType::Int64,
            table: Some("customers".into()),
            name: "id".into(),
            nullable: false,
        }],
        unique: true,
    }];
    catalog.add_table(orders);

    let mut order_items = plain_table("order_items", &["id", "order_id"]);
    order_items.foreign_keys = Some(TableForeignKeys {
        declared: vec![fk_order_items_order],
        referenced: vec![],
    });
    order_items.indexes = vec![IndexDef {
        id: "pk_orders".into(),
        database: "db".into(),
        table: "orders".into(),
        expressions: vec![ScalarExpr::GetField {
            index: 0,
            sql_type: SqlType::Int64,
            table: Some("orders".into()),
            name: "id".into(),
            nullable: false,
        }],
        unique: true,
    }];
    catalog.add_table(order_items);

    catalog.add_function(FunctionSignature {
        name: "count".into(),
        is_aggregate: true,
        min_args: 0,
        max_args: Some(1),
    });

    catalog
}
