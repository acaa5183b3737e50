//! Once-before-default rule batch (spec.md §4.6): structural normalization
//! that must happen exactly once, before the fixed-point default batch
//! gets a chance to loop over the tree.

use std::sync::Arc;

use crate::plan::{transform_up, LogicalPlan, ScalarExpr, Transformed};
use crate::rules::{Rule, RuleContext, RuleError};

/// Collapse a chain of nested `TableAlias` nodes into the innermost one,
/// matching SQL's rule that the last-applied alias wins (spec.md §4.6
/// "flatten table aliases").
pub struct FlattenTableAliases;

impl Rule for FlattenTableAliases {
    fn name(&self) -> &'static str {
        "flatten_table_aliases"
    }

    fn apply(
        &self,
        plan: Arc<LogicalPlan>,
        _ctx: &mut RuleContext,
    ) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::TableAlias { input, alias } = node.as_ref() {
                if let LogicalPlan::TableAlias { input: inner, .. } = input.as_ref() {
                    return Ok(Transformed::Yes(Arc::new(LogicalPlan::TableAlias {
                        input: inner.clone(),
                        alias: alias.clone(),
                    })));
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Rewrite `NATURAL JOIN` into an `InnerJoin` whose `on` predicate equates
/// every column name common to both sides, topped with a `Project` that
/// emits each shared column once (spec.md §4.6 "NATURAL JOIN rewrite" and
/// §8 scenario 2: `t1(a,b,c) NATURAL JOIN t2(d,c,b,e)` projects
/// `b,c,a,d,e`). Requires both sides already resolved, since it reads their
/// output schemas.
pub struct NaturalJoinRewrite;

impl Rule for NaturalJoinRewrite {
    fn name(&self) -> &'static str {
        "natural_join_rewrite"
    }

    fn apply(
        &self,
        plan: Arc<LogicalPlan>,
        _ctx: &mut RuleContext,
    ) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::NaturalJoin { left, right } = node.as_ref() {
                if !left.is_resolved() || !right.is_resolved() {
                    return Ok(Transformed::No(node));
                }
                let left_schema = left.output_schema();
                let right_schema = right.output_schema();
                let common: Vec<String> = left_schema
                    .columns()
                    .iter()
                    .filter(|lc| right_schema.columns().iter().any(|rc| rc.name.eq_ignore_ascii_case(&lc.name)))
                    .map(|c| c.name.clone())
                    .collect();

                let mut predicate: Option<ScalarExpr> = None;
                for name in &common {
                    let (li, lc) = left_schema.find_by_name(name)[0];
                    let (ri, rc) = right_schema.find_by_name(name)[0];
                    let eq = ScalarExpr::Comparison {
                        op: crate::plan::expr::Comparator::Eq,
                        left: Box::new(ScalarExpr::GetField {
                            index: li,
                            sql_type: lc.sql_type,
                            table: lc.source_table.clone(),
                            name: lc.name.clone(),
                            nullable: lc.nullable,
                        }),
                        right: Box::new(ScalarExpr::GetField {
                            index: left_schema.arity() + ri,
                            sql_type: rc.sql_type,
                            table: rc.source_table.clone(),
                            name: rc.name.clone(),
                            nullable: rc.nullable,
                        }),
                    };
                    predicate = Some(match predicate {
                        None => eq,
                        Some(p) => ScalarExpr::And(Box::new(p), Box::new(eq)),
                    });
                }

                let on = predicate.unwrap_or(ScalarExpr::Literal(crate::plan::expr::Literal::Boolean(true)));
                let join = Arc::new(LogicalPlan::InnerJoin {
                    left: left.clone(),
                    right: right.clone(),
                    on,
                    kind: crate::plan::JoinKind::Inner,
                });

                let mut items = Vec::with_capacity(left_schema.arity() + right_schema.arity() - common.len());
                for name in &common {
                    let (li, lc) = left_schema.find_by_name(name)[0];
                    items.push(ScalarExpr::GetField {
                        index: li,
                        sql_type: lc.sql_type,
                        table: lc.source_table.clone(),
                        name: lc.name.clone(),
                        nullable: lc.nullable,
                    });
                }
                for (i, c) in left_schema.columns().iter().enumerate() {
                    if !common.iter().any(|n| n.eq_ignore_ascii_case(&c.name)) {
                        items.push(ScalarExpr::GetField {
                            index: i,
                            sql_type: c.sql_type,
                            table: c.source_table.clone(),
                            name: c.name.clone(),
                            nullable: c.nullable,
                        });
                    }
                }
                for (i, c) in right_schema.columns().iter().enumerate() {
                    if !common.iter().any(|n| n.eq_ignore_ascii_case(&c.name)) {
                        items.push(ScalarExpr::GetField {
                            index: left_schema.arity() + i,
                            sql_type: c.sql_type,
                            table: c.source_table.clone(),
                            name: c.name.clone(),
                            nullable: c.nullable,
                        });
                    }
                }

                return Ok(Transformed::Yes(Arc::new(LogicalPlan::Project {
                    input: join,
                    items,
                    schema: crate::plan::Schema::empty(),
                })));
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Only structural rewrites that don't depend on resolution belong here;
/// `NaturalJoinRewrite` needs resolved table schemas, so it runs as part
/// of the fixed-point default batch instead (see `rules::default`).
pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(FlattenTableAliases)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::catalog::SessionContext;
    use crate::config::AnalyzerConfig;
    use crate::plan::expr::SqlType;
    use crate::plan::{ColumnDescriptor, Schema};
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
    fn natural_join_rewrites_to_inner_join_on_common_columns() {
        let catalog = MemoryCatalog::new();
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let plan = Arc::new(LogicalPlan::NaturalJoin {
            left: table("a"),
            right: table("b"),
        });
        let rewritten = NaturalJoinRewrite.apply(plan, &mut rc).unwrap();
        assert!(rewritten.changed());
        match rewritten.into_inner().as_ref() {
            LogicalPlan::Project { input, .. } => {
                assert!(matches!(input.as_ref(), LogicalPlan::InnerJoin { .. }))
            }
            other => panic!("expected Project over InnerJoin, got {other:?}"),
        }
    }

    #[test]
    fn flattens_nested_table_aliases_to_innermost() {
        let catalog = MemoryCatalog::new();
        let mut session = SessionContext::new(Some("db".into()));
        let config = AnalyzerConfig::default();
        let mut rc = ctx(&catalog, &mut session, &config);

        let inner = Arc::new(LogicalPlan::TableAlias {
            input: table("a"),
            alias: "first".into(),
        });
        let outer = Arc::new(LogicalPlan::TableAlias {
            input: inner,
            alias: "second".into(),
        });
        let rewritten = FlattenTableAliases.apply(outer, &mut rc).unwrap().into_inner();
        match rewritten.as_ref() {
            LogicalPlan::TableAlias { alias, input } => {
                assert_eq!(alias, "second");
                assert!(matches!(input.as_ref(), LogicalPlan::ResolvedTable { .. }));
            }
            other => panic!("expected TableAlias, got {other:?}"),
        }
    }
}
