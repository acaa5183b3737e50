//! Diagnostic CLI driver (spec.md §10.5).
//!
//! No network surface: builds a small in-memory catalog fixture, runs each
//! of the analyzer's worked scenarios (spec.md §8) through `Analyzer::analyze`,
//! and pretty-prints the resolved plan or the error.

use std::sync::Arc;

use clap::Parser;

use query_analyzer::analyzer::Analyzer;
use query_analyzer::catalog::memory::MemoryCatalog;
use query_analyzer::catalog::{FunctionSignature, IndexDef, SessionContext, Table, TableForeignKeys};
use query_analyzer::config::{AnalyzerConfig, CliConfig};
use query_analyzer::plan::expr::{Comparator, Literal, SqlType};
use query_analyzer::plan::{ColumnDescriptor, ForeignKeyDef, LogicalPlan, RefAction, ScalarExpr, Schema, SortField};

/// Query analyzer diagnostic driver
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose per-rule trace logging
    #[arg(long)]
    debug: bool,

    /// Upper bound on rule-application parallelism within a batch
    #[arg(long)]
    parallelism: Option<usize>,

    /// Disable prepared-statement analysis
    #[arg(long)]
    disable_prepared_statements: bool,

    /// Fixed-point batch iteration cap
    #[arg(long)]
    max_analysis_iters: Option<usize>,

    /// Recursion/depth cap for foreign-key chain planning
    #[arg(long)]
    foreign_key_max_depth: Option<usize>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        CliConfig {
            debug: cli.debug,
            parallelism: cli.parallelism,
            disable_prepared_statements: cli.disable_prepared_statements,
            max_analysis_iters: cli.max_analysis_iters,
            foreign_key_max_depth: cli.foreign_key_max_depth,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    println!("\nQuery Analyzer v{}\n", env!("CARGO_PKG_VERSION"));

    let cli_config: CliConfig = cli.into();
    let config = match AnalyzerConfig::from_cli(cli_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let catalog = build_fixture_catalog();
    let analyzer = Analyzer::build(config);

    for (title, plan) in scenarios() {
        println!("=== {title} ===");
        println!("before: {plan:#?}");
        let mut session = SessionContext::new(Some("db".into()));
        match analyzer.analyze(&catalog, &mut session, plan) {
            Ok(resolved) => {
                println!("after:  {resolved:#?}");
                if !session.warnings.is_empty() {
                    println!("warnings: {:?}", session.warnings);
                }
            }
            Err(e) => println!("error: {e}"),
        }
        println!();
    }
}

/// A handful of tables/views/functions sufficient to drive spec.md §8's
/// worked scenarios: `foo`/`t`/`t1`/`t2` plus a parent/child/grandchild
/// foreign-key chain (`customers` -> `orders` -> `order_items`).
fn build_fixture_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.add_database("db");

    let mut foo_schema = Schema::empty();
    foo_schema.push(ColumnDescriptor::new("a", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "foo".into(),
        schema: foo_schema,
        foreign_keys: None,
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

    let mut t_schema = Schema::empty();
    t_schema.push(ColumnDescriptor::new("a", SqlType::Int64, false));
    t_schema.push(ColumnDescriptor::new("b", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "t".into(),
        schema: t_schema,
        foreign_keys: None,
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

    let mut t1_schema = Schema::empty();
    t1_schema.push(ColumnDescriptor::new("a", SqlType::Int64, false));
    t1_schema.push(ColumnDescriptor::new("b", SqlType::Int64, false));
    t1_schema.push(ColumnDescriptor::new("c", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "t1".into(),
        schema: t1_schema,
        foreign_keys: None,
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

    let mut t2_schema = Schema::empty();
    t2_schema.push(ColumnDescriptor::new("d", SqlType::Int64, false));
    t2_schema.push(ColumnDescriptor::new("c", SqlType::Int64, false));
    t2_schema.push(ColumnDescriptor::new("b", SqlType::Int64, false));
    t2_schema.push(ColumnDescriptor::new("e", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "t2".into(),
        schema: t2_schema,
        foreign_keys: None,
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

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

    let mut customers_schema = Schema::empty();
    customers_schema.push(ColumnDescriptor::new("id", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "customers".into(),
        schema: customers_schema,
        foreign_keys: Some(TableForeignKeys {
            declared: vec![],
            referenced: vec![fk_orders_customer.clone()],
        }),
        indexes: vec![],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

    let mut orders_schema = Schema::empty();
    orders_schema.push(ColumnDescriptor::new("id", SqlType::Int64, false));
    orders_schema.push(ColumnDescriptor::new("customer_id", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "orders".into(),
        schema: orders_schema,
        foreign_keys: Some(TableForeignKeys {
            declared: vec![fk_orders_customer],
            referenced: vec![fk_order_items_order.clone()],
        }),
        indexes: vec![IndexDef {
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
        }],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

    let mut order_items_schema = Schema::empty();
    order_items_schema.push(ColumnDescriptor::new("id", SqlType::Int64, false));
    order_items_schema.push(ColumnDescriptor::new("order_id", SqlType::Int64, false));
    catalog.add_table(Table {
        database: "db".into(),
        name: "order_items".into(),
        schema: order_items_schema,
        foreign_keys: Some(TableForeignKeys {
            declared: vec![fk_order_items_order],
            referenced: vec![],
        }),
        indexes: vec![IndexDef {
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
        }],
        check_constraints: vec![],
        auto_increment_column: None,
        has_delete_trigger: false,
    });

    catalog.add_function(FunctionSignature {
        name: "count".into(),
        is_aggregate: true,
        min_args: 0,
        max_args: Some(1),
    });

    catalog
}

fn unresolved_table(name: &str) -> Arc<LogicalPlan> {
    Arc::new(LogicalPlan::UnresolvedTable {
        database: None,
        name: name.into(),
        as_of: None,
    })
}

/// spec.md §8's six worked scenarios, built directly as unresolved plans.
fn scenarios() -> Vec<(&'static str, Arc<LogicalPlan>)> {
    vec![
        ("1. column qualification", column_qualification_scenario()),
        ("2. natural join", natural_join_scenario()),
        ("3. cross-join to inner-join rewrite", cross_join_scenario()),
        ("4. order-by literal", order_by_literal_scenario()),
        ("5. hash-IN selection", hash_in_scenario()),
        ("6. foreign-key cascade", foreign_key_cascade_scenario()),
    ]
}

fn column_qualification_scenario() -> Arc<LogicalPlan> {
    let subquery = Arc::new(LogicalPlan::Project {
        input: unresolved_table("foo"),
        items: vec![ScalarExpr::UnresolvedColumn { name: "a".into() }],
        schema: Schema::empty(),
    });
    Arc::new(LogicalPlan::Project {
        input: Arc::new(LogicalPlan::SubqueryAlias {
            input: subquery,
            alias: "sub".into(),
            schema: Schema::empty(),
        }),
        items: vec![
            ScalarExpr::UnresolvedColumn { name: "a".into() },
            ScalarExpr::UnresolvedColumn { name: "b".into() },
        ],
        schema: Schema::empty(),
    })
}

fn natural_join_scenario() -> Arc<LogicalPlan> {
    Arc::new(LogicalPlan::Project {
        input: Arc::new(LogicalPlan::NaturalJoin {
            left: unresolved_table("t1"),
            right: unresolved_table("t2"),
        }),
        items: vec![ScalarExpr::Star],
        schema: Schema::empty(),
    })
}

fn cross_join_scenario() -> Arc<LogicalPlan> {
    Arc::new(LogicalPlan::Filter {
        input: Arc::new(LogicalPlan::CrossJoin {
            left: unresolved_table("t1"),
            right: unresolved_table("t2"),
        }),
        predicate: ScalarExpr::And(
            Box::new(ScalarExpr::Comparison {
                op: Comparator::Eq,
                left: Box::new(ScalarExpr::UnresolvedQualifiedColumn { table: "t1".into(), name: "a".into() }),
                right: Box::new(ScalarExpr::UnresolvedQualifiedColumn { table: "t2".into(), name: "d".into() }),
            }),
            Box::new(ScalarExpr::Comparison {
                op: Comparator::Eq,
                left: Box::new(ScalarExpr::UnresolvedQualifiedColumn { table: "t1".into(), name: "c".into() }),
                right: Box::new(ScalarExpr::Literal(Literal::Int64(5))),
            }),
        ),
    })
}

fn order_by_literal_scenario() -> Arc<LogicalPlan> {
    Arc::new(LogicalPlan::Sort {
        input: Arc::new(LogicalPlan::Project {
            input: unresolved_table("t"),
            items: vec![
                ScalarExpr::UnresolvedColumn { name: "a".into() },
                ScalarExpr::UnresolvedColumn { name: "b".into() },
            ],
            schema: Schema::empty(),
        }),
        order_by: vec![SortField { expr_index: 1, ascending: true, nulls_first: false }],
    })
}

fn hash_in_scenario() -> Arc<LogicalPlan> {
    Arc::new(LogicalPlan::Filter {
        input: unresolved_table("t"),
        predicate: ScalarExpr::InTuple {
            needle: Box::new(ScalarExpr::UnresolvedColumn { name: "a".into() }),
            haystack: vec![
                ScalarExpr::Literal(Literal::Int64(1)),
                ScalarExpr::Literal(Literal::Int64(2)),
                ScalarExpr::Literal(Literal::Int64(3)),
            ],
        },
    })
}

fn foreign_key_cascade_scenario() -> Arc<LogicalPlan> {
    let target = unresolved_table("customers");
    let input = Arc::new(LogicalPlan::Filter {
        input: target.clone(),
        predicate: ScalarExpr::Comparison {
            op: Comparator::Eq,
            left: Box::new(ScalarExpr::UnresolvedColumn { name: "id".into() }),
            right: Box::new(ScalarExpr::Literal(Literal::Int64(1))),
        },
    });
    Arc::new(LogicalPlan::DeleteFrom { target, input })
}
