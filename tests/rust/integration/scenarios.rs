use std::sync::Arc;

use query_analyzer::analyzer::{Analyzer, AnalyzerError};
use query_analyzer::catalog::SessionContext;
use query_analyzer::config::AnalyzerConfig;
use query_analyzer::plan::expr::{Comparator, Literal};
use query_analyzer::plan::{LogicalPlan, ScalarExpr, Schema, SortField};

use super::common::{fixture_catalog, unresolved_table};

fn analyzer() -> Analyzer {
    Analyzer::build(AnalyzerConfig::default())
}

fn session() -> SessionContext {
    SessionContext::new(Some("db".into()))
}

/// spec.md §8 scenario 1: a column qualified only through a subquery alias
/// must resolve once the alias's schema becomes known, even though it's
/// `DeferredColumn` on the iteration where the alias's schema is still
/// empty.
#[test]
fn column_qualification_through_subquery_alias_resolves() {
    let catalog = fixture_catalog();
    let subquery = Arc::new(LogicalPlan::Project {
        input: unresolved_table("foo"),
        items: vec![ScalarExpr::UnresolvedColumn { name: "a".into() }],
        schema: Schema::empty(),
    });
    let plan = Arc::new(LogicalPlan::Project {
        input: Arc::new(LogicalPlan::SubqueryAlias {
            input: subquery,
            alias: "sub".into(),
            schema: Schema::empty(),
        }),
        items: vec![ScalarExpr::UnresolvedColumn { name: "a".into() }],
        schema: Schema::empty(),
    });

    let resolved = analyzer().analyze(&catalog, &mut session(), plan).unwrap();
    assert!(resolved.is_resolved());
    assert_eq!(resolved.output_schema().arity(), 1);
    match resolved.as_ref() {
        LogicalPlan::Project { items, .. } => match &items[0] {
            ScalarExpr::GetField { name, table, .. } => {
                assert_eq!(name, "a");
                assert_eq!(table.as_deref(), Some("sub"));
            }
            other => panic!("expected GetField, got {other:?}"),
        },
        other => panic!("expected Project, got {other:?}"),
    }
}

/// The same shape, but requesting a column (`b`) that genuinely doesn't
/// exist anywhere in the subquery's schema must still fail, and with the
/// specific column name, not a generic "not fully resolved" error.
#[test]
fn column_qualification_errors_on_genuinely_missing_column() {
    let catalog = fixture_catalog();
    let subquery = Arc::new(LogicalPlan::Project {
        input: unresolved_table("foo"),
        items: vec![ScalarExpr::UnresolvedColumn { name: "a".into() }],
        schema: Schema::empty(),
    });
    let plan = Arc::new(LogicalPlan::Project {
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
    });

    let err = analyzer().analyze(&catalog, &mut session(), plan).unwrap_err();
    let message = err.to_string();
    assert!(message.contains('b'), "expected the missing column 'b' named in the error, got: {message}");
}

/// spec.md §8 scenario 2: `t1(a,b,c) NATURAL JOIN t2(d,c,b,e)` rewrites to
/// an `InnerJoin` on `b`,`c` topped with a dedup projection in column order
/// `b,c,a,d,e`.
#[test]
fn natural_join_rewrites_and_projects_in_expected_order() {
    let catalog = fixture_catalog();
    let plan = Arc::new(LogicalPlan::Project {
        input: Arc::new(LogicalPlan::NaturalJoin {
            left: unresolved_table("t1"),
            right: unresolved_table("t2"),
        }),
        items: vec![ScalarExpr::Star],
        schema: Schema::empty(),
    });

    let resolved = analyzer().analyze(&catalog, &mut session(), plan).unwrap();
    match resolved.as_ref() {
        LogicalPlan::Project { input, items, schema } => {
            assert!(matches!(input.as_ref(), LogicalPlan::InnerJoin { .. }));
            let names: Vec<&str> = items
                .iter()
                .map(|e| match e {
                    ScalarExpr::GetField { name, .. } => name.as_str(),
                    other => panic!("expected GetField, got {other:?}"),
                })
                .collect();
            assert_eq!(names, vec!["b", "c", "a", "d", "e"]);
            assert_eq!(schema.arity(), 5);
        }
        other => panic!("expected Project over InnerJoin, got {other:?}"),
    }
}

/// spec.md §8 scenario 3: a `CrossJoin` filtered by an equi-join predicate
/// promotes to an `InnerJoin`.
#[test]
fn cross_join_with_equi_predicate_promotes_to_inner_join() {
    let catalog = fixture_catalog();
    let plan = Arc::new(LogicalPlan::Filter {
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
    });

    let resolved = analyzer().analyze(&catalog, &mut session(), plan).unwrap();
    match resolved.as_ref() {
        LogicalPlan::Filter { input, .. } => {
            assert!(matches!(input.as_ref(), LogicalPlan::InnerJoin { .. }));
        }
        other => panic!("expected Filter over InnerJoin, got {other:?}"),
    }
}

/// spec.md §8 scenario 4: `ORDER BY 2` over a two-column star projection
/// resolves to the second column once the star has expanded and the
/// projection's arity is known; an ordinal beyond that arity is a hard
/// error.
#[test]
fn order_by_ordinal_resolves_once_star_expands() {
    let catalog = fixture_catalog();
    let plan = Arc::new(LogicalPlan::Sort {
        input: Arc::new(LogicalPlan::Project {
            input: unresolved_table("t"),
            items: vec![ScalarExpr::Star],
            schema: Schema::empty(),
        }),
        // Pending-ordinal sentinel: expr_index encodes (ordinal - 1); the
        // arity of zero at construction time is what marks it pending.
        order_by: vec![SortField { expr_index: 1, ascending: true, nulls_first: false }],
    });

    let resolved = analyzer().analyze(&catalog, &mut session(), plan).unwrap();
    match resolved.as_ref() {
        LogicalPlan::Sort { order_by, .. } => {
            assert_eq!(order_by[0].expr_index, 1);
        }
        other => panic!("expected Sort, got {other:?}"),
    }
}

#[test]
fn order_by_ordinal_beyond_arity_errors() {
    let catalog = fixture_catalog();
    let plan = Arc::new(LogicalPlan::Sort {
        input: Arc::new(LogicalPlan::Project {
            input: unresolved_table("t"),
            items: vec![ScalarExpr::Star],
            schema: Schema::empty(),
        }),
        order_by: vec![SortField { expr_index: 5, ascending: true, nulls_first: false }],
    });

    let err = analyzer().analyze(&catalog, &mut session(), plan).unwrap_err();
    assert!(matches!(err, AnalyzerError::Rule(_)));
}

/// spec.md §8 scenario 5: `a IN (1, 2, 3)` over a bare column becomes a
/// `HashInTuple` once `a` is resolved.
#[test]
fn in_tuple_over_literals_rewrites_to_hash_in() {
    let catalog = fixture_catalog();
    let plan = Arc::new(LogicalPlan::Filter {
        input: unresolved_table("t"),
        predicate: ScalarExpr::InTuple {
            needle: Box::new(ScalarExpr::UnresolvedColumn { name: "a".into() }),
            haystack: vec![
                ScalarExpr::Literal(Literal::Int64(1)),
                ScalarExpr::Literal(Literal::Int64(2)),
                ScalarExpr::Literal(Literal::Int64(3)),
            ],
        },
    });

    let resolved = analyzer().analyze(&catalog, &mut session(), plan).unwrap();
    match resolved.as_ref() {
        LogicalPlan::Filter { predicate, .. } => {
            assert!(matches!(predicate, ScalarExpr::HashInTuple { .. }));
        }
        other => panic!("expected Filter, got {other:?}"),
    }
}

/// spec.md §8 scenario 6: deleting a `customers` row cascades a matching
/// `ForeignKeyHandler` wrapping the `DeleteFrom` once the foreign key chain
/// is applied.
#[test]
fn delete_from_parent_table_gets_foreign_key_handler() {
    let catalog = fixture_catalog();
    let target = unresolved_table("customers");
    let input = Arc::new(LogicalPlan::Filter {
        input: target.clone(),
        predicate: ScalarExpr::Comparison {
            op: Comparator::Eq,
            left: Box::new(ScalarExpr::UnresolvedColumn { name: "id".into() }),
            right: Box::new(ScalarExpr::Literal(Literal::Int64(1))),
        },
    });
    let plan = Arc::new(LogicalPlan::DeleteFrom { target, input });

    let resolved = analyzer().analyze(&catalog, &mut session(), plan).unwrap();
    match resolved.as_ref() {
        LogicalPlan::ForeignKeyHandler { cascades, .. } => {
            assert_eq!(cascades.len(), 1);
            assert_eq!(cascades[0].action, query_analyzer::plan::RefAction::Cascade);
            let child_editor = cascades[0].child_editor.as_ref().expect("orders cascade editor should be built");
            match child_editor.as_ref() {
                LogicalPlan::ForeignKeyHandler { cascades: grandchild_cascades, .. } => {
                    assert_eq!(grandchild_cascades.len(), 1);
                    assert_eq!(grandchild_cascades[0].action, query_analyzer::plan::RefAction::Restrict);
                }
                other => panic!("expected nested ForeignKeyHandler for order_items, got {other:?}"),
            }
        }
        other => panic!("expected ForeignKeyHandler, got {other:?}"),
    }
}
