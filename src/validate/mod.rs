//! Validators (spec.md §4.7, "C7" in the system overview).
//!
//! Each validator is a pure, read-only inspection of an already-rewritten
//! plan. They run in the post-default "validation" batch phase and return
//! the first violation found rather than collecting every one — matching
//! `clickgraph`'s own fail-fast analyzer passes.

pub mod errors;

pub use errors::ValidationError;

use crate::plan::expr::SqlType;
use crate::plan::{inspect, LogicalPlan, ScalarExpr};
use crate::resolver::columns;

/// Every node and expression in the tree must satisfy `is_resolved()`
/// (spec.md §4.7 `validate_resolved`). A lingering `DeferredColumn` gets the
/// more specific `TableColumnNotFound` diagnosis; anything else unresolved
/// (an unresolved table, an unresolved function that never matched the
/// catalog) falls back to the generic violation.
pub fn validate_resolved(plan: &LogicalPlan) -> Result<(), ValidationError> {
    let mut result = Ok(());
    inspect(plan, true, &mut |node| {
        for expr in node.expressions() {
            if let Err(e) = columns::reject_unresolved_deferred(&expr) {
                result = Err(e.into());
                return false;
            }
            if !expr.is_resolved() {
                result = Err(ValidationError::NotFullyResolved);
                return false;
            }
        }
        if matches!(node, LogicalPlan::UnresolvedTable { .. }) {
            result = Err(ValidationError::NotFullyResolved);
            return false;
        }
        true
    });
    result
}

/// A `Sort` whose `expr_index` is within the enclosing projection's arity
/// is valid by construction once `resolve_order_by_ordinals` has run; this
/// re-checks the invariant holds after every other rewrite (spec.md §4.7
/// `validate_order_by`).
pub fn validate_order_by(plan: &LogicalPlan) -> Result<(), ValidationError> {
    let mut violation = None;
    inspect(plan, false, &mut |node| {
        if let LogicalPlan::Sort { input, order_by } = node {
            let arity = input.output_schema().arity();
            for field in order_by {
                if field.expr_index >= arity {
                    violation = Some(ValidationError::OrderByNotInSelectList(field.expr_index));
                    return false;
                }
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Every non-aggregated column a `GroupBy`'s `aggregates` list references
/// must also appear in `group_exprs` (spec.md §4.7 `validate_group_by`).
/// `relaxed` mirrors `sql_mode_relaxed_group_by`: when set, extra columns
/// that are functionally dependent on the grouping key are tolerated.
pub fn validate_group_by(plan: &LogicalPlan, relaxed: bool) -> Result<(), ValidationError> {
    if relaxed {
        return Ok(());
    }
    let mut violation = None;
    inspect(plan, false, &mut |node| {
        if let LogicalPlan::GroupBy { group_exprs, aggregates, .. } = node {
            let grouped: Vec<&ScalarExpr> = group_exprs.iter().collect();
            for agg in aggregates {
                if let ScalarExpr::ResolvedFunction { is_aggregate: true, .. } = agg {
                    continue;
                }
                if matches!(agg, ScalarExpr::GetField { .. }) && !grouped.contains(&agg) {
                    violation = Some(ValidationError::NotGroupedOrAggregated(describe(agg)));
                    return false;
                }
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn describe(expr: &ScalarExpr) -> String {
    match expr {
        ScalarExpr::GetField { table: Some(t), name, .. } => format!("{t}.{name}"),
        ScalarExpr::GetField { name, .. } => name.clone(),
        other => format!("{other:?}"),
    }
}

/// Every branch of a `Union` must expose the same arity (spec.md §4.7
/// `validate_union_schemas_match`); type widening is `union_schema_merge`'s
/// job, not this validator's.
pub fn validate_union_schemas_match(plan: &LogicalPlan) -> Result<(), ValidationError> {
    let mut violation = None;
    inspect(plan, false, &mut |node| {
        if let LogicalPlan::Union { inputs, .. } = node {
            if let Some((first, rest)) = inputs.split_first() {
                let left = first.output_schema().arity();
                for other in rest {
                    let right = other.output_schema().arity();
                    if right != left {
                        violation = Some(ValidationError::UnionArityMismatch { left, right });
                        return false;
                    }
                }
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Comparisons between fundamentally incompatible types (e.g. `Blob` vs
/// `Boolean`) are rejected; anything `SqlType::widen` can reconcile is
/// accepted (spec.md §4.7 `validate_operands`).
pub fn validate_operands(plan: &LogicalPlan) -> Result<(), ValidationError> {
    let mut violation = None;
    inspect(plan, false, &mut |node| {
        for expr in node.expressions() {
            if let Err(e) = check_operand_types(&expr) {
                violation = Some(e);
                return false;
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn check_operand_types(expr: &ScalarExpr) -> Result<(), ValidationError> {
    if let ScalarExpr::Comparison { left, right, .. } = expr {
        let (lt, rt) = (left.sql_type(), right.sql_type());
        if !comparable(lt, rt) {
            return Err(ValidationError::IncompatibleComparisonTypes { left: lt, right: rt });
        }
    }
    for child in expr.children() {
        check_operand_types(child)?;
    }
    Ok(())
}

fn comparable(a: SqlType, b: SqlType) -> bool {
    use SqlType::*;
    matches!(
        (a, b),
        (Unknown, _) | (_, Unknown) | (Null, _) | (_, Null)
    ) || a == b
        || matches!(
            (a, b),
            (Int64, Float64) | (Float64, Int64) | (Int64, Decimal { .. }) | (Decimal { .. }, Int64)
        )
}

/// Every non-`EXISTS` subquery must project exactly one column — a scalar
/// context only has room to bind a single value per row (SPEC_FULL.md
/// §10.2 `validate_subquery_columns`).
pub fn validate_subquery_columns(plan: &LogicalPlan) -> Result<(), ValidationError> {
    let mut violation = None;
    inspect(plan, true, &mut |node| {
        for expr in node.expressions() {
            if let Err(e) = check_subquery_arity(&expr) {
                violation = Some(e);
                return false;
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn check_subquery_arity(expr: &ScalarExpr) -> Result<(), ValidationError> {
    if let ScalarExpr::Subquery(sq) = expr {
        if !sq.is_exists {
            let arity = sq.plan.output_schema().arity();
            if arity != 1 {
                return Err(ValidationError::SubqueryMultipleColumns(arity));
            }
        }
        validate_subquery_columns(&sq.plan)?;
    }
    for child in expr.children() {
        check_subquery_arity(child)?;
    }
    Ok(())
}

/// Every `GetField` inside a table's CHECK constraint must name that same
/// table — a constraint can only see the row it guards, never a sibling
/// table (spec.md §4.6 "validate CHECK expressions reference only the
/// declaring table").
pub fn validate_check_constraints(plan: &LogicalPlan) -> Result<(), ValidationError> {
    let mut violation = None;
    inspect(plan, false, &mut |node| {
        if let LogicalPlan::ResolvedTable { name, check_constraints, .. } = node {
            for constraint in check_constraints {
                if let Some(stray) = find_foreign_table_reference(&constraint.expr, name) {
                    violation = Some(ValidationError::InvalidCheckConstraint(format!(
                        "{} references '{}', not the declaring table '{}'",
                        constraint.name, stray, name
                    )));
                    return false;
                }
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn find_foreign_table_reference(expr: &ScalarExpr, declaring_table: &str) -> Option<String> {
    if let ScalarExpr::GetField { table: Some(t), .. } = expr {
        if !t.eq_ignore_ascii_case(declaring_table) {
            return Some(t.clone());
        }
    }
    expr.children().iter().find_map(|c| find_foreign_table_reference(c, declaring_table))
}

/// A `ResolvedFunction` with `is_aggregate: true` may only appear inside a
/// `GroupBy`'s own `aggregates` list or the accompanying HAVING filter
/// above it, never bare inside a `Filter`/`Project` with no grouping
/// (spec.md §4.7 `validate_aggregations`).
pub fn validate_aggregations(plan: &LogicalPlan) -> Result<(), ValidationError> {
    fn contains_bare_aggregate(expr: &ScalarExpr) -> Option<String> {
        if let ScalarExpr::ResolvedFunction { is_aggregate: true, name, .. } = expr {
            return Some(name.clone());
        }
        expr.children().iter().find_map(|c| contains_bare_aggregate(c))
    }

    let mut violation = None;
    inspect(plan, false, &mut |node| {
        if matches!(node, LogicalPlan::GroupBy { .. }) {
            return true;
        }
        for expr in node.expressions() {
            if let Some(name) = contains_bare_aggregate(&expr) {
                violation = Some(ValidationError::AggregateOutsideGroupBy(name));
                return false;
            }
        }
        true
    });
    match violation {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::expr::{Comparator, Literal};
    use crate::plan::{ColumnDescriptor, Schema};

    fn resolved_table() -> LogicalPlan {
        let mut schema = Schema::empty();
        schema.push(ColumnDescriptor::new("id", SqlType::Int64, false).with_source_table("t"));
        LogicalPlan::ResolvedTable {
            database: "db".into(),
            name: "t".into(),
            schema,
            as_of: None,
            check_constraints: vec![],
        }
    }

    #[test]
    fn rejects_unresolved_table() {
        let plan = LogicalPlan::UnresolvedTable {
            database: None,
            name: "t".into(),
            as_of: None,
        };
        assert_eq!(validate_resolved(&plan), Err(ValidationError::NotFullyResolved));
    }

    #[test]
    fn accepts_fully_resolved_plan() {
        assert!(validate_resolved(&resolved_table()).is_ok());
    }

    #[test]
    fn rejects_comparison_between_incompatible_types() {
        let plan = LogicalPlan::Filter {
            input: std::sync::Arc::new(resolved_table()),
            predicate: ScalarExpr::Comparison {
                op: Comparator::Eq,
                left: Box::new(ScalarExpr::Literal(Literal::Text("x".into()))),
                right: Box::new(ScalarExpr::Literal(Literal::Boolean(true))),
            },
        };
        assert!(validate_operands(&plan).is_err());
    }

    #[test]
    fn scalar_subquery_with_two_columns_errors() {
        let mut wide = Schema::empty();
        wide.push(ColumnDescriptor::new("a", SqlType::Int64, false));
        wide.push(ColumnDescriptor::new("b", SqlType::Int64, false));
        let subquery = crate::plan::SubqueryExpr {
            plan: std::sync::Arc::new(LogicalPlan::EmptyTable { schema: wide }),
            is_exists: false,
            correlated: false,
        };
        let plan = LogicalPlan::Filter {
            input: std::sync::Arc::new(resolved_table()),
            predicate: ScalarExpr::Comparison {
                op: Comparator::Eq,
                left: Box::new(ScalarExpr::Subquery(subquery)),
                right: Box::new(ScalarExpr::Literal(Literal::Int64(1))),
            },
        };
        assert_eq!(validate_subquery_columns(&plan), Err(ValidationError::SubqueryMultipleColumns(2)));
    }

    #[test]
    fn exists_subquery_with_multiple_columns_is_fine() {
        let mut wide = Schema::empty();
        wide.push(ColumnDescriptor::new("a", SqlType::Int64, false));
        wide.push(ColumnDescriptor::new("b", SqlType::Int64, false));
        let subquery = crate::plan::SubqueryExpr {
            plan: std::sync::Arc::new(LogicalPlan::EmptyTable { schema: wide }),
            is_exists: true,
            correlated: false,
        };
        let plan = LogicalPlan::Filter {
            input: std::sync::Arc::new(resolved_table()),
            predicate: ScalarExpr::Subquery(subquery),
        };
        assert!(validate_subquery_columns(&plan).is_ok());
    }

    #[test]
    fn check_constraint_referencing_another_table_errors() {
        let plan = LogicalPlan::ResolvedTable {
            database: "db".into(),
            name: "orders".into(),
            schema: Schema::empty(),
            as_of: None,
            check_constraints: vec![crate::plan::CheckConstraint {
                name: "ck_cross_table".into(),
                expr: ScalarExpr::Comparison {
                    op: Comparator::Eq,
                    left: Box::new(ScalarExpr::GetField {
                        index: 0,
                        sql_type: SqlType::Int64,
                        table: Some("customers".into()),
                        name: "id".into(),
                        nullable: false,
                    }),
                    right: Box::new(ScalarExpr::Literal(Literal::Int64(1))),
                },
            }],
        };
        assert!(matches!(validate_check_constraints(&plan), Err(ValidationError::InvalidCheckConstraint(_))));
    }

    #[test]
    fn check_constraint_over_own_table_is_fine() {
        let plan = LogicalPlan::ResolvedTable {
            database: "db".into(),
            name: "orders".into(),
            schema: Schema::empty(),
            as_of: None,
            check_constraints: vec![crate::plan::CheckConstraint {
                name: "ck_positive_total".into(),
                expr: ScalarExpr::Comparison {
                    op: Comparator::Eq,
                    left: Box::new(ScalarExpr::GetField {
                        index: 0,
                        sql_type: SqlType::Int64,
                        table: Some("orders".into()),
                        name: "total".into(),
                        nullable: false,
                    }),
                    right: Box::new(ScalarExpr::Literal(Literal::Int64(0))),
                },
            }],
        };
        assert!(validate_check_constraints(&plan).is_ok());
    }

    #[test]
    fn union_arity_mismatch_errors() {
        let mut wide = Schema::empty();
        wide.push(ColumnDescriptor::new("a", SqlType::Int64, false));
        wide.push(ColumnDescriptor::new("b", SqlType::Int64, false));
        let plan = LogicalPlan::Union {
            inputs: vec![
                std::sync::Arc::new(LogicalPlan::EmptyTable { schema: Schema::empty() }),
                std::sync::Arc::new(LogicalPlan::EmptyTable { schema: wide }),
            ],
            is_distinct: false,
            schema: Schema::empty(),
        };
        assert!(validate_union_schemas_match(&plan).is_err());
    }
}
