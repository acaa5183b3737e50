//! Once-after-default rule batch (spec.md §4.6): optimizations that only
//! make sense once the tree is fully resolved — they read things (output
//! schemas, catalog index/foreign-key metadata) that earlier passes may
//! still be rewriting underneath them.

use std::collections::HashSet;
use std::sync::Arc;

use crate::plan::expr::Literal;
use crate::plan::{transform_up, LogicalPlan, ScalarExpr, Transformed};
use crate::rules::{Rule, RuleContext, RuleError, RuleSelector};

/// Collapse a `Limit` directly over a `Sort` into a single `TopN` node
/// (spec.md §4.6 "TopN insertion"), letting execution avoid materializing
/// the full sorted input before truncating it.
pub struct TopNInsertion;

impl Rule for TopNInsertion {
    fn name(&self) -> &'static str {
        "topn_insertion"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Limit { input, limit } = node.as_ref() {
                if let LogicalPlan::Sort { input: sort_input, order_by } = input.as_ref() {
                    return Ok(Transformed::Yes(Arc::new(LogicalPlan::TopN {
                        input: sort_input.clone(),
                        order_by: order_by.clone(),
                        limit: limit.clone(),
                    })));
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Rewrite `InTuple` into `HashInTuple` once every haystack element has
/// resolved down to a literal (spec.md §4.6 "apply hash-based IN"),
/// letting execution build a hash set instead of a linear OR chain.
pub struct HashInRewrite;

impl Rule for HashInRewrite {
    fn name(&self) -> &'static str {
        "hash_in_rewrite"
    }

    /// This rule only fires once every haystack element is a concrete
    /// literal. During `PrepareQuery` a `BindVar` placeholder hasn't been
    /// substituted yet, so running it there is wasted work (spec.md §4.5
    /// "skips rules that depend on bound parameter values"); it belongs
    /// back in once `AnalyzePrepared` has substituted real literals.
    fn selectors(&self) -> &'static [RuleSelector] {
        &[RuleSelector::FullAnalysis, RuleSelector::AnalyzePrepared]
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        let rewritten = crate::plan::transform_expressions_up(plan.clone(), &mut |e| match &e {
            ScalarExpr::InTuple { needle, haystack } if !haystack.is_empty() => {
                let literals: Option<Vec<Literal>> = haystack
                    .iter()
                    .map(|h| match h {
                        ScalarExpr::Literal(l) => Some(l.clone()),
                        _ => None,
                    })
                    .collect();
                match literals {
                    Some(lits) => ScalarExpr::HashInTuple {
                        needle: needle.clone(),
                        haystack: Arc::new(lits),
                    },
                    None => e,
                }
            }
            _ => e,
        });
        let changed = rewritten != plan;
        Ok(Transformed::new(rewritten, changed))
    }
}

/// Drop a `Project` whose items are exactly `GetField(0..n)` in schema
/// order over an input with an identical schema — a no-op projection
/// (spec.md §4.6 "redundant Projection erasure").
pub struct RedundantProjectionErasure;

impl Rule for RedundantProjectionErasure {
    fn name(&self) -> &'static str {
        "redundant_projection_erasure"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Project { input, items, schema } = node.as_ref() {
                let input_schema = input.output_schema();
                let is_identity = *schema == input_schema
                    && items.len() == input_schema.arity()
                    && items.iter().enumerate().all(|(i, item)| {
                        matches!(item, ScalarExpr::GetField { index, .. } if *index == i)
                    });
                if is_identity {
                    return Ok(Transformed::Yes(input.clone()));
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Attach referential-integrity handling to every `InsertInto`/`Update`/
/// `DeleteFrom` target whose table declares or is referenced by a foreign
/// key (spec.md §4.6.1; §8 scenario 6 deletes a parent cascading through a
/// child into a grandchild). Builds a `ForeignKeyHandler` wrapping the
/// mutation with the declared-FK parent lookups and the referenced-FK
/// cascades, stopping (degrading the edge to `Restrict`) at a cycle or at
/// the configured depth cap rather than recursing forever.
pub struct ForeignKeyApplication;

impl Rule for ForeignKeyApplication {
    fn name(&self) -> &'static str {
        "foreign_key_application"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        if !ctx.session.foreign_key_checks {
            return Ok(Transformed::No(plan));
        }
        let max_depth = ctx.config.foreign_key_max_depth;
        let catalog = ctx.catalog;
        transform_up(plan, &mut |node| {
            let target = match node.as_ref() {
                LogicalPlan::InsertInto { target, .. }
                | LogicalPlan::Update { target, .. }
                | LogicalPlan::DeleteFrom { target, .. } => target.clone(),
                _ => return Ok(Transformed::No(node)),
            };
            let (database, name) = match target.as_ref() {
                LogicalPlan::ResolvedTable { database, name, .. } => (database.clone(), name.clone()),
                _ => return Ok(Transformed::No(node)),
            };
            let table = match catalog.table(ctx.session, &database, &name) {
                Ok(t) => t,
                Err(_) => return Ok(Transformed::No(node)),
            };
            let Some(fks) = table.foreign_keys.as_ref() else {
                return Ok(Transformed::No(node));
            };
            if fks.declared.is_empty() && fks.referenced.is_empty() {
                return Ok(Transformed::No(node));
            }

            let mut seen = HashSet::new();
            seen.insert((database.to_ascii_lowercase(), name.to_ascii_lowercase()));

            let references: Vec<_> = fks
                .declared
                .iter()
                .map(|fk| {
                    let parent_indexes = catalog.indexes_for(&fk.parent_database, &fk.parent_table);
                    let parent_index_id = parent_indexes
                        .iter()
                        .max_by_key(|idx| idx.longest_covering_prefix(&fk.parent_columns))
                        .map(|idx| idx.id.clone())
                        .unwrap_or_else(|| format!("{}.{}:implicit", fk.parent_database, fk.parent_table));
                    let row_mapper = fk
                        .columns
                        .iter()
                        .enumerate()
                        .map(|(i, _)| crate::plan::RowMapperEntry::FromChildColumn(i))
                        .collect();
                    crate::plan::ForeignKeyReferenceHandler {
                        fk: fk.clone(),
                        parent_index_id,
                        row_mapper,
                    }
                })
                .collect();

            let cascades = build_cascades(catalog, ctx.session, &fks.referenced, &mut seen, 1, max_depth)?;

            Ok(Transformed::Yes(Arc::new(LogicalPlan::ForeignKeyHandler {
                input: node,
                references,
                cascades,
            })))
        })
    }
}

/// Recursively build the cascade tree for one table's referenced FKs
/// (spec.md §4.6.1 "recursively build an editor for the affected child").
/// `seen` tracks the child side of every FK already planned in this chain,
/// so a cycle or a re-entered table degrades to `Restrict` instead of
/// recursing forever; `depth` enforces the same degradation at the
/// configured cap.
fn build_cascades(
    catalog: &dyn crate::catalog::Catalog,
    session: &crate::catalog::SessionContext,
    referenced: &[crate::plan::ForeignKeyDef],
    seen: &mut HashSet<(String, String)>,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<crate::plan::ForeignKeyCascade>, RuleError> {
    referenced
        .iter()
        .map(|fk| {
            let key = (fk.child_database.to_ascii_lowercase(), fk.child_table.to_ascii_lowercase());
            if seen.contains(&key) || depth >= max_depth {
                return Ok(crate::plan::ForeignKeyCascade {
                    fk: fk.clone(),
                    action: crate::plan::RefAction::Restrict,
                    child_editor: None,
                });
            }
            seen.insert(key);
            let child_editor = match catalog.table(session, &fk.child_database, &fk.child_table) {
                Ok(child) => {
                    let nested = match &child.foreign_keys {
                        Some(fks) => build_cascades(catalog, session, &fks.referenced, seen, depth + 1, max_depth)?,
                        None => vec![],
                    };
                    let input = Arc::new(crate::catalog::resolved_table_from(&child, None));
                    Some(Arc::new(LogicalPlan::ForeignKeyHandler { input, references: vec![], cascades: nested }))
                }
                Err(_) => None,
            };
            Ok(crate::plan::ForeignKeyCascade {
                fk: fk.clone(),
                action: fk.on_delete,
                child_editor,
            })
        })
        .collect()
}

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(TopNInsertion),
        Box::new(HashInRewrite),
        Box::new(RedundantProjectionErasure),
        Box::new(ForeignKeyApplication),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::catalog::{SessionContext, Table};
    use crate::config::AnalyzerConfig;
    use crate::plan::expr::SqlType;
    use crate::plan::{ColumnDescriptor, ForeignKeyDef, RefAction, Schema, SortField};
    use crate::scope::ScopeStack;

    fn ctx<'a>(catalog: &'a MemoryCatalog, session: &'a mut SessionContext, config: &'a AnalyzerConfig) -> RuleContext<'a> {
        RuleContext {
            catalog,
            session,
            scope: ScopeStack::new(),
            config,
        }
    }

    fn table(name: &str) -> Arc<LogicalPlan> {
        let mut schema = Schema::empty();
        schema.push(ColumnDescriptor::new("id", SqlType::Int64, false).with_source_table(name));
        Arc::new(LogicalPlan::ResolvedTable {
            database: "db".into(),
            name: name.into(),
            schema,
            as_of: None,
            check_constraints: vec![],
        })
    }

    #[test]
    fn collapses_limit_over_sort_into_topn() {
        let catalog = MemoryCatalog::new();
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let plan = Arc::new(LogicalPlan::Limit {
            input: Arc::new(LogicalPlan::Sort {
                input: table("a"),
                order_by: vec![SortField { expr_index: 0, ascending: true, nulls_first: false }],
            }),
            limit: ScalarExpr::Literal(crate::plan::expr::Literal::Int64(10)),
        });
        let rewritten = TopNInsertion.apply(plan, &mut rc).unwrap();
        assert!(rewritten.changed());
        assert!(matches!(rewritten.into_inner().as_ref(), LogicalPlan::TopN { .. }));
    }

    #[test]
    fn rewrites_in_tuple_of_literals_to_hash_in_tuple() {
        let catalog = MemoryCatalog::new();
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let plan = Arc::new(LogicalPlan::Filter {
            input: table("a"),
            predicate: ScalarExpr::InTuple {
                needle: Box::new(ScalarExpr::GetField {
                    index: 0,
                    sql_type: SqlType::Int64,
                    table: Some("a".into()),
                    name: "id".into(),
                    nullable: false,
                }),
                haystack: vec![
                    ScalarExpr::Literal(crate::plan::expr::Literal::Int64(1)),
                    ScalarExpr::Literal(crate::plan::expr::Literal::Int64(2)),
                ],
            },
        });
        let rewritten = HashInRewrite.apply(plan, &mut rc).unwrap().into_inner();
        match rewritten.as_ref() {
            LogicalPlan::Filter { predicate, .. } => assert!(matches!(predicate, ScalarExpr::HashInTuple { .. })),
            other => panic!("expected Filter, got {other:?}"),
        }
    }

    #[test]
    fn erases_identity_projection_over_matching_schema() {
        let catalog = MemoryCatalog::new();
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let input = table("a");
        let schema = input.output_schema();
        let plan = Arc::new(LogicalPlan::Project {
            input: input.clone(),
            items: vec![ScalarExpr::GetField {
                index: 0,
                sql_type: SqlType::Int64,
                table: Some("a".into()),
                name: "id".into(),
                nullable: false,
            }],
            schema,
        });
        let rewritten = RedundantProjectionErasure.apply(plan, &mut rc).unwrap();
        assert!(rewritten.changed());
        assert!(Arc::ptr_eq(&rewritten.into_inner(), &input));
    }

    #[test]
    fn keeps_projection_that_reorders_or_drops_columns() {
        let catalog = MemoryCatalog::new();
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let mut schema = Schema::empty();
        schema.push(ColumnDescriptor::new("id", SqlType::Int64, false).with_source_table("a"));
        schema.push(ColumnDescriptor::new("name", SqlType::Text, true).with_source_table("a"));
        let input = Arc::new(LogicalPlan::ResolvedTable {
            database: "db".into(),
            name: "a".into(),
            schema,
            as_of: None,
            check_constraints: vec![],
        });
        // Projects only the second column, not the identity list.
        let mut out_schema = Schema::empty();
        out_schema.push(ColumnDescriptor::new("name", SqlType::Text, true).with_source_table("a"));
        let plan = Arc::new(LogicalPlan::Project {
            input,
            items: vec![ScalarExpr::GetField {
                index: 1,
                sql_type: SqlType::Text,
                table: Some("a".into()),
                name: "name".into(),
                nullable: true,
            }],
            schema: out_schema,
        });
        let rewritten = RedundantProjectionErasure.apply(plan, &mut rc).unwrap();
        assert!(!rewritten.changed());
        assert!(matches!(rewritten.into_inner().as_ref(), LogicalPlan::Project { .. }));
    }

    #[test]
    fn foreign_key_cascade_restricts_at_cycle() {
        let catalog = MemoryCatalog::new();
        catalog.add_database("db");
        let fk = ForeignKeyDef {
            name: "fk_self".into(),
            child_database: "db".into(),
            child_table: "nodes".into(),
            columns: vec!["parent_id".into()],
            parent_database: "db".into(),
            parent_table: "nodes".into(),
            parent_columns: vec!["id".into()],
            on_delete: RefAction::Cascade,
            on_update: RefAction::NoAction,
        };
        catalog.add_table(Table {
            database: "db".into(),
            name: "nodes".into(),
            schema: Schema::empty(),
            foreign_keys: Some(crate::catalog::TableForeignKeys {
                declared: vec![fk.clone()],
                referenced: vec![fk],
            }),
            indexes: vec![],
            check_constraints: vec![],
            auto_increment_column: None,
            has_delete_trigger: false,
        });
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let target = catalog.table(&SessionContext::new(None), "db", "nodes").unwrap();
        let insert = Arc::new(LogicalPlan::InsertInto {
            target: Arc::new(crate::catalog::resolved_table_from(&target, None)),
            source: Arc::new(LogicalPlan::Values { rows: vec![], schema: Schema::empty() }),
            columns: vec![],
        });
        let rewritten = ForeignKeyApplication.apply(insert, &mut rc).unwrap().into_inner();
        match rewritten.as_ref() {
            LogicalPlan::ForeignKeyHandler { cascades, .. } => {
                assert_eq!(cascades[0].action, RefAction::Restrict);
            }
            other => panic!("expected ForeignKeyHandler, got {other:?}"),
        }
    }

    #[test]
    fn delete_from_parent_wraps_in_foreign_key_handler_with_cascade() {
        let catalog = MemoryCatalog::new();
        catalog.add_database("db");
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
        catalog.add_table(Table {
            database: "db".into(),
            name: "customers".into(),
            schema: Schema::empty(),
            foreign_keys: Some(crate::catalog::TableForeignKeys {
                declared: vec![],
                referenced: vec![fk_orders_customer],
            }),
            indexes: vec![],
            check_constraints: vec![],
            auto_increment_column: None,
            has_delete_trigger: false,
        });
        catalog.add_table(Table {
            database: "db".into(),
            name: "orders".into(),
            schema: Schema::empty(),
            foreign_keys: Some(crate::catalog::TableForeignKeys {
                declared: vec![],
                referenced: vec![fk_order_items_order],
            }),
            indexes: vec![],
            check_constraints: vec![],
            auto_increment_column: None,
            has_delete_trigger: false,
        });
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let target = catalog.table(&SessionContext::new(None), "db", "customers").unwrap();
        let resolved_target = Arc::new(crate::catalog::resolved_table_from(&target, None));
        let delete = Arc::new(LogicalPlan::DeleteFrom {
            target: resolved_target.clone(),
            input: resolved_target,
        });
        let rewritten = ForeignKeyApplication.apply(delete, &mut rc).unwrap().into_inner();
        match rewritten.as_ref() {
            LogicalPlan::ForeignKeyHandler { references, cascades, .. } => {
                assert!(references.is_empty());
                assert_eq!(cascades[0].action, RefAction::Cascade);
                let child_editor = cascades[0].child_editor.as_ref().expect("orders editor should be built");
                match child_editor.as_ref() {
                    LogicalPlan::ForeignKeyHandler { cascades: grandchild_cascades, .. } => {
                        assert_eq!(grandchild_cascades[0].action, RefAction::Restrict);
                        assert!(grandchild_cascades[0].child_editor.is_none());
                    }
                    other => panic!("expected nested ForeignKeyHandler, got {other:?}"),
                }
            }
            other => panic!("expected ForeignKeyHandler, got {other:?}"),
        }
    }
}
