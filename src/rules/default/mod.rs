//! Default (fixed-point) rule batch (spec.md §4.6): the bulk of name
//! resolution and local optimization, run repeatedly until nothing in the
//! batch changes the tree or the configured iteration cap is hit.

use std::sync::Arc;

use crate::plan::expr::{Comparator, Literal};
use crate::plan::{transform_up, JoinKind, LogicalPlan, ScalarExpr, Schema, Transformed};
use crate::resolver::{columns, functions, order_by, stars, tables};
use crate::rules::once_before::NaturalJoinRewrite;
use crate::rules::{Rule, RuleContext, RuleError};
use crate::scope::{Frame, ScopeStack};

fn single_frame_scope(schema: &Schema) -> ScopeStack {
    let mut scope = ScopeStack::new();
    scope.push(Frame::new(schema.clone()));
    scope
}

fn resolve_exprs_against(exprs: &[ScalarExpr], input_schema: &Schema) -> Result<(Vec<ScalarExpr>, bool), RuleError> {
    let scope = single_frame_scope(input_schema);
    let mut changed = false;
    let mut out = Vec::with_capacity(exprs.len());
    for e in exprs {
        let resolved = columns::resolve_columns_in_expr(&scope, e)?;
        changed |= resolved != *e;
        out.push(resolved);
    }
    Ok((out, changed))
}

/// Resolve every `UnresolvedTable` against the catalog (spec.md §4.4
/// algorithm 1), substituting resolved tables and views in place.
pub struct ResolveTables;

impl Rule for ResolveTables {
    fn name(&self) -> &'static str {
        "resolve_tables"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::UnresolvedTable { database, name, as_of } = node.as_ref() {
                let resolved = tables::resolve_table(ctx.catalog, ctx.session, database.as_deref(), name, as_of.as_ref())?;
                Ok(Transformed::Yes(Arc::new(resolved)))
            } else {
                Ok(Transformed::No(node))
            }
        })
    }
}

/// Expand `Star`/`QualifiedStar` projection items against the immediate
/// input's now-resolved schema (spec.md §4.6 "expand stars"). Must run
/// after `ResolveTables` within the same fixed-point batch: a `Project`
/// over an unresolved table has an empty output schema, so expanding
/// stars any earlier would project zero columns.
pub struct ExpandStars;

impl Rule for ExpandStars {
    fn name(&self) -> &'static str {
        "expand_stars"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Project { input, items, schema } = node.as_ref() {
                if !items.iter().any(|e| matches!(e, ScalarExpr::Star | ScalarExpr::QualifiedStar { .. })) {
                    return Ok(Transformed::No(node));
                }
                if !input.is_resolved() {
                    return Ok(Transformed::No(node));
                }
                let expanded = stars::expand_stars(items, &input.output_schema())?;
                if expanded == *items {
                    return Ok(Transformed::No(node));
                }
                return Ok(Transformed::Yes(Arc::new(LogicalPlan::Project {
                    input: input.clone(),
                    items: expanded,
                    schema: schema.clone(),
                })));
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Column qualification + column-to-GetField resolution over every
/// expression-owning node, working from that node's immediate input
/// schema (spec.md §4.4 bullets 2-3).
///
/// Correlated references into an *outer* query's scope are out of reach
/// of this single-frame approach; see DESIGN.md for the scoping note.
pub struct ResolveColumns;

impl Rule for ResolveColumns {
    fn name(&self) -> &'static str {
        "resolve_columns"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            let input_schema = match node.as_ref() {
                LogicalPlan::Project { input, .. }
                | LogicalPlan::Filter { input, .. }
                | LogicalPlan::GroupBy { input, .. }
                | LogicalPlan::Limit { input, .. }
                | LogicalPlan::Offset { input, .. } => input.output_schema(),
                LogicalPlan::InnerJoin { left, right, .. }
                | LogicalPlan::LeftJoin { left, right, .. }
                | LogicalPlan::RightJoin { left, right, .. } => {
                    let mut s = left.output_schema();
                    s.extend(right.output_schema());
                    s
                }
                _ => return Ok(Transformed::No(node)),
            };
            let exprs = node.expressions();
            if exprs.is_empty() {
                return Ok(Transformed::No(node));
            }
            let (resolved, changed) = resolve_exprs_against(&exprs, &input_schema)?;
            if !changed {
                return Ok(Transformed::No(node));
            }
            let rebuilt = node.with_expressions(resolved)?;
            Ok(Transformed::Yes(Arc::new(rebuilt)))
        })
    }
}

/// Function resolution against the catalog (spec.md §4.4).
pub struct ResolveFunctions;

impl Rule for ResolveFunctions {
    fn name(&self) -> &'static str {
        "resolve_functions"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        let catalog = ctx.catalog;
        let rewritten = crate::plan::transform_expressions_up(plan.clone(), &mut |e| {
            functions::resolve_function(catalog, e.clone()).unwrap_or(e)
        });
        let changed = rewritten != plan;
        Ok(Transformed::new(rewritten, changed))
    }
}

/// Resolve a 1-based `ORDER BY <ordinal>` against the `Sort`'s nearest
/// enclosing projection arity (spec.md §4.4, error `OrderByColumnIndex`).
/// Ordinals beyond the projection's current arity are left alone since an
/// earlier-running rule (e.g. star expansion) may still grow it.
pub struct ResolveOrderByOrdinals;

impl Rule for ResolveOrderByOrdinals {
    fn name(&self) -> &'static str {
        "resolve_order_by_ordinals"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Sort { input, order_by } = node.as_ref() {
                let arity = input.output_schema().arity();
                if order_by.iter().all(|f| f.expr_index < arity) {
                    return Ok(Transformed::No(node));
                }
                let mut resolved = Vec::with_capacity(order_by.len());
                for field in order_by {
                    if field.expr_index < arity {
                        resolved.push(*field);
                    } else {
                        let ordinal = field.expr_index as i64 + 1;
                        let index = order_by::resolve_ordinal(ordinal, arity)?;
                        resolved.push(crate::plan::SortField { expr_index: index, ..*field });
                    }
                }
                return Ok(Transformed::Yes(Arc::new(LogicalPlan::Sort {
                    input: input.clone(),
                    order_by: resolved,
                })));
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Promote a `Filter` directly over a `CrossJoin` whose predicate carries
/// an equi-join condition into an `InnerJoin` (spec.md §4.6 "cross-join to
/// inner-join promotion").
pub struct CrossJoinToInnerJoin;

impl Rule for CrossJoinToInnerJoin {
    fn name(&self) -> &'static str {
        "cross_join_to_inner_join"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Filter { input, predicate } = node.as_ref() {
                if let LogicalPlan::CrossJoin { left, right } = input.as_ref() {
                    if matches!(predicate, ScalarExpr::Comparison { op: Comparator::Eq, .. }) {
                        return Ok(Transformed::Yes(Arc::new(LogicalPlan::InnerJoin {
                            left: left.clone(),
                            right: right.clone(),
                            on: predicate.clone(),
                            kind: JoinKind::Inner,
                        })));
                    }
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Transpose every `RightJoin` into an equivalent `LeftJoin` with sides
/// swapped, so later passes only ever need to reason about `Left`
/// (spec.md §4.6 "RIGHT to LEFT JOIN transpose").
pub struct RightJoinTranspose;

impl Rule for RightJoinTranspose {
    fn name(&self) -> &'static str {
        "right_join_transpose"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::RightJoin { left, right, on } = node.as_ref() {
                return Ok(Transformed::Yes(Arc::new(LogicalPlan::LeftJoin {
                    left: right.clone(),
                    right: left.clone(),
                    on: on.clone(),
                })));
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Fold boolean constants out of a `Filter`'s predicate, dropping the node
/// entirely when the residual is the literal `true` (spec.md §4.6 "Filter
/// simplification / constant folding").
pub struct FilterSimplification;

impl Rule for FilterSimplification {
    fn name(&self) -> &'static str {
        "filter_simplification"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Filter { input, predicate } = node.as_ref() {
                let folded = fold_constants(predicate);
                match &folded {
                    ScalarExpr::Literal(Literal::Boolean(true)) => return Ok(Transformed::Yes(input.clone())),
                    _ if folded != *predicate => {
                        return Ok(Transformed::Yes(Arc::new(LogicalPlan::Filter {
                            input: input.clone(),
                            predicate: folded,
                        })))
                    }
                    _ => {}
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

fn fold_constants(expr: &ScalarExpr) -> ScalarExpr {
    match expr {
        ScalarExpr::And(l, r) => {
            let (l, r) = (fold_constants(l), fold_constants(r));
            match (&l, &r) {
                (ScalarExpr::Literal(Literal::Boolean(true)), _) => r,
                (_, ScalarExpr::Literal(Literal::Boolean(true))) => l,
                (ScalarExpr::Literal(Literal::Boolean(false)), _) | (_, ScalarExpr::Literal(Literal::Boolean(false))) => {
                    ScalarExpr::Literal(Literal::Boolean(false))
                }
                _ => ScalarExpr::And(Box::new(l), Box::new(r)),
            }
        }
        ScalarExpr::Not(inner) => match fold_constants(inner) {
            ScalarExpr::Literal(Literal::Boolean(b)) => ScalarExpr::Literal(Literal::Boolean(!b)),
            other => ScalarExpr::Not(Box::new(other)),
        },
        ScalarExpr::IsTrue(inner) => match fold_constants(inner) {
            ScalarExpr::Literal(Literal::Boolean(b)) => ScalarExpr::Literal(Literal::Boolean(b)),
            other => ScalarExpr::IsTrue(Box::new(other)),
        },
        other => other.clone(),
    }
}

/// Replace `Distinct` with `OrderedDistinct` when its input is already a
/// `Sort` over exactly the distinct columns, enabling a streaming dedup
/// instead of a full hash-based one (spec.md §4.6 "optimize Distinct to
/// OrderedDistinct").
pub struct DistinctToOrderedDistinct;

impl Rule for DistinctToOrderedDistinct {
    fn name(&self) -> &'static str {
        "distinct_to_ordered_distinct"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Distinct { input } = node.as_ref() {
                if let LogicalPlan::Sort { order_by, .. } = input.as_ref() {
                    let arity = input.output_schema().arity();
                    let covers_every_column = order_by.len() == arity
                        && (0..arity).all(|i| order_by.iter().any(|f| f.expr_index == i));
                    if covers_every_column {
                        return Ok(Transformed::Yes(Arc::new(LogicalPlan::OrderedDistinct {
                            input: input.clone(),
                        })));
                    }
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Widen each branch of a `Union` to a common column type so the merged
/// schema is well-typed (spec.md §4.6 "merge UNION schemas").
pub struct UnionSchemaMerge;

impl Rule for UnionSchemaMerge {
    fn name(&self) -> &'static str {
        "union_schema_merge"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Union { inputs, is_distinct, schema } = node.as_ref() {
                if inputs.iter().any(|i| !i.is_resolved()) {
                    return Ok(Transformed::No(node));
                }
                let mut merged: Option<Schema> = None;
                for input in inputs {
                    let s = input.output_schema();
                    merged = Some(match merged {
                        None => s,
                        Some(acc) => widen_schema(&acc, &s),
                    });
                }
                let merged = merged.unwrap_or_else(Schema::empty);
                if merged == *schema {
                    return Ok(Transformed::No(node));
                }
                return Ok(Transformed::Yes(Arc::new(LogicalPlan::Union {
                    inputs: inputs.clone(),
                    is_distinct: *is_distinct,
                    schema: merged,
                })));
            }
            Ok(Transformed::No(node))
        })
    }
}

/// Recompute a `Project`'s output schema from its resolved items, and a
/// `SubqueryAlias`'s from its input's now-resolved schema with every
/// column's source table rewritten to the alias (spec.md §4.6 "derive
/// Project/SubqueryAlias output schema", mirroring how `TableAlias` already
/// delegates dynamically). Every later pass that reads `output_schema()` or
/// the alias map on one of these two node kinds depends on this having run
/// to a fixed point first.
pub struct DeriveSchemas;

impl Rule for DeriveSchemas {
    fn name(&self) -> &'static str {
        "derive_schemas"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| match node.as_ref() {
            LogicalPlan::Project { input, items, schema } => {
                if items.iter().any(|e| !e.is_resolved()) {
                    return Ok(Transformed::No(node));
                }
                let derived = columns::projected_schema(items);
                if derived == *schema {
                    return Ok(Transformed::No(node));
                }
                Ok(Transformed::Yes(Arc::new(LogicalPlan::Project {
                    input: input.clone(),
                    items: items.clone(),
                    schema: derived,
                })))
            }
            LogicalPlan::SubqueryAlias { input, alias, schema } => {
                if !input.is_resolved() {
                    return Ok(Transformed::No(node));
                }
                let mut derived = input.output_schema();
                for c in derived.0.iter_mut() {
                    c.source_table = Some(alias.clone());
                }
                if derived == *schema {
                    return Ok(Transformed::No(node));
                }
                Ok(Transformed::Yes(Arc::new(LogicalPlan::SubqueryAlias {
                    input: input.clone(),
                    alias: alias.clone(),
                    schema: derived,
                })))
            }
            LogicalPlan::GroupBy { input, group_exprs, aggregates, schema } => {
                if aggregates.iter().any(|e| !e.is_resolved()) {
                    return Ok(Transformed::No(node));
                }
                let derived = columns::projected_schema(aggregates);
                if derived == *schema {
                    return Ok(Transformed::No(node));
                }
                Ok(Transformed::Yes(Arc::new(LogicalPlan::GroupBy {
                    input: input.clone(),
                    group_exprs: group_exprs.clone(),
                    aggregates: aggregates.clone(),
                    schema: derived,
                })))
            }
            _ => Ok(Transformed::No(node)),
        })
    }
}

/// Rewrite a `GROUP BY <alias>` that names one of the enclosing `GroupBy`'s
/// own aggregate aliases (rather than an input column) into the aliased
/// expression itself, so later passes resolve a real expression instead of
/// a name that doesn't exist in the input schema (spec.md §4.6 "push down
/// GROUP BY aliases"). Must run before `ResolveColumns` settles the
/// now-substituted `group_exprs` against the input.
pub struct PushGroupByAliasesDown;

impl Rule for PushGroupByAliasesDown {
    fn name(&self) -> &'static str {
        "push_group_by_aliases_down"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, _ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        transform_up(plan, &mut |node| {
            if let LogicalPlan::GroupBy { input, group_exprs, aggregates, schema } = node.as_ref() {
                let mut changed = false;
                let rewritten: Vec<ScalarExpr> = group_exprs
                    .iter()
                    .map(|g| {
                        let name = match g {
                            ScalarExpr::UnresolvedColumn { name } => Some(name.as_str()),
                            ScalarExpr::DeferredColumn { name, table: None } => Some(name.as_str()),
                            _ => None,
                        };
                        let Some(name) = name else { return g.clone() };
                        match aggregates.iter().find(|a| matches!(a, ScalarExpr::Alias { name: n, .. } if n == name)) {
                            Some(ScalarExpr::Alias { child, .. }) => {
                                changed = true;
                                child.as_ref().clone()
                            }
                            _ => g.clone(),
                        }
                    })
                    .collect();
                if !changed {
                    return Ok(Transformed::No(node));
                }
                return Ok(Transformed::Yes(Arc::new(LogicalPlan::GroupBy {
                    input: input.clone(),
                    group_exprs: rewritten,
                    aggregates: aggregates.clone(),
                    schema: schema.clone(),
                })));
            }
            Ok(Transformed::No(node))
        })
    }
}

fn expr_references_index_at_or_above(expr: &ScalarExpr, threshold: usize) -> bool {
    if let ScalarExpr::GetField { index, .. } = expr {
        if *index >= threshold {
            return true;
        }
    }
    expr.children().iter().any(|c| expr_references_index_at_or_above(c, threshold))
}

/// Drop the right side of a `LeftJoin` immediately under a `Project` when
/// none of the surviving `items` read a right-side column and the join
/// condition pins the right row to a column carrying a UNIQUE index, so
/// the join can neither duplicate nor drop a left row (spec.md §4.6 "prune
/// unreferenced tables from joins"). Only matches directly under `Project`
/// since a `Project` is the only node that fully hides its input's schema
/// from whatever reads it from above; a bare `Filter`/`GroupBy` over the
/// join doesn't create that boundary, so this intentionally leaves those
/// alone rather than risk pruning a column something further up still
/// reads through.
pub struct PruneUnreferencedJoinTables;

impl Rule for PruneUnreferencedJoinTables {
    fn name(&self) -> &'static str {
        "prune_unreferenced_join_tables"
    }

    fn apply(&self, plan: Arc<LogicalPlan>, ctx: &mut RuleContext) -> Result<Transformed<Arc<LogicalPlan>>, RuleError> {
        let catalog = ctx.catalog;
        transform_up(plan, &mut |node| {
            if let LogicalPlan::Project { input, items, schema } = node.as_ref() {
                if let LogicalPlan::LeftJoin { left, right, on } = input.as_ref() {
                    if !left.is_resolved() || !right.is_resolved() {
                        return Ok(Transformed::No(node));
                    }
                    let left_arity = left.output_schema().arity();
                    if items.iter().any(|i| expr_references_index_at_or_above(i, left_arity)) {
                        return Ok(Transformed::No(node));
                    }
                    let LogicalPlan::ResolvedTable { database, name, .. } = right.as_ref() else {
                        return Ok(Transformed::No(node));
                    };
                    let ScalarExpr::Comparison { op: Comparator::Eq, left: l, right: r } = on else {
                        return Ok(Transformed::No(node));
                    };
                    let right_col_name = match (l.as_ref(), r.as_ref()) {
                        (ScalarExpr::GetField { index, name, .. }, _) if *index >= left_arity => Some(name.clone()),
                        (_, ScalarExpr::GetField { index, name, .. }) if *index >= left_arity => Some(name.clone()),
                        _ => None,
                    };
                    let Some(right_col_name) = right_col_name else {
                        return Ok(Transformed::No(node));
                    };
                    let has_unique_index = catalog.indexes_for(database, name).iter().any(|idx| {
                        idx.unique
                            && idx.expressions.len() == 1
                            && matches!(&idx.expressions[0], ScalarExpr::GetField { name: n, .. } if n.eq_ignore_ascii_case(&right_col_name))
                    });
                    if !has_unique_index {
                        return Ok(Transformed::No(node));
                    }
                    return Ok(Transformed::Yes(Arc::new(LogicalPlan::Project {
                        input: left.clone(),
                        items: items.clone(),
                        schema: schema.clone(),
                    })));
                }
            }
            Ok(Transformed::No(node))
        })
    }
}

fn widen_schema(a: &Schema, b: &Schema) -> Schema {
    let columns = a
        .columns()
        .iter()
        .zip(b.columns().iter())
        .map(|(ca, cb)| crate::plan::ColumnDescriptor {
            name: ca.name.clone(),
            sql_type: ca.sql_type.widen(cb.sql_type),
            source_table: None,
            nullable: ca.nullable || cb.nullable,
            default: None,
        })
        .collect();
    Schema::new(columns)
}

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ResolveTables),
        Box::new(ExpandStars),
        Box::new(NaturalJoinRewrite),
        Box::new(PushGroupByAliasesDown),
        Box::new(ResolveColumns),
        Box::new(ResolveFunctions),
        Box::new(DeriveSchemas),
        Box::new(ResolveOrderByOrdinals),
        Box::new(CrossJoinToInnerJoin),
        Box::new(RightJoinTranspose),
        Box::new(FilterSimplification),
        Box::new(DistinctToOrderedDistinct),
        Box::new(UnionSchemaMerge),
        Box::new(PruneUnreferencedJoinTables),
    ]
}
