//! Generic traversal primitives over the plan tree (spec.md §4.1).
//!
//! `transform_up` is the bottom-up rewrite primitive every rule is built
//! from; `inspect` is the top-down, opt-in-descent primitive used by
//! read-only passes (validators, referenced-table collection). Both mirror
//! the "rebuild_or_clone" idiom `clickgraph`'s optimizer passes use: a rule
//! only allocates a new node when a descendant actually changed.

use std::sync::Arc;

use crate::plan::LogicalPlan;

/// Wraps a rewritten value together with a same-tree marker, so that a
/// batch can detect a fixed point without falling back to structural
/// equality on every pass (spec.md §9 "Immutability and fixed-point
/// detection").
#[derive(Debug, Clone)]
pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn new(value: T, changed: bool) -> Self {
        if changed {
            Transformed::Yes(value)
        } else {
            Transformed::No(value)
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Transformed::Yes(v) | Transformed::No(v) => v,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Transformed<U> {
        match self {
            Transformed::Yes(v) => Transformed::Yes(f(v)),
            Transformed::No(v) => Transformed::No(f(v)),
        }
    }

    /// Combine with another transform result: the combined marker is
    /// "changed" if either side changed.
    pub fn or(self, other: bool) -> Transformed<T> {
        match self {
            Transformed::Yes(v) => Transformed::Yes(v),
            Transformed::No(v) => Transformed::new(v, other),
        }
    }
}

/// Opaque nodes are analyzed independently of the enclosing plan and are
/// not descended into by `inspect` unless the caller opts in
/// (spec.md §4.1 "opaque nodes").
pub fn is_opaque(plan: &LogicalPlan) -> bool {
    matches!(
        plan,
        LogicalPlan::SubqueryAlias { .. }
            | LogicalPlan::ProcedureCall { .. }
            | LogicalPlan::CreateTrigger { .. }
            | LogicalPlan::CreateProcedure { .. }
            | LogicalPlan::Block { .. }
    )
}

/// Bottom-up rewrite: recursively transform every descendant first, then
/// apply `f` to the resulting node. Returns a same-tree marker so callers
/// can detect a fixed point cheaply.
pub fn transform_up<E>(
    plan: Arc<LogicalPlan>,
    f: &mut impl FnMut(Arc<LogicalPlan>) -> Result<Transformed<Arc<LogicalPlan>>, E>,
) -> Result<Transformed<Arc<LogicalPlan>>, E> {
    let children = plan.children();
    if children.is_empty() {
        return f(plan);
    }

    let mut any_child_changed = false;
    let mut new_children = Vec::with_capacity(children.len());
    for child in children {
        let transformed = transform_up(child, f)?;
        any_child_changed |= transformed.changed();
        new_children.push(transformed.into_inner());
    }

    let rebuilt = if any_child_changed {
        Arc::new(
            plan.with_children(new_children)
                .expect("transform_up preserves child arity"),
        )
    } else {
        plan.clone()
    };

    let applied = f(rebuilt)?;
    Ok(applied.or(any_child_changed))
}

/// Top-down inspection: `g` is invoked pre-order on each node and decides
/// whether to descend further. Opaque nodes are skipped unless
/// `descend_into_opaque` is set.
pub fn inspect(plan: &LogicalPlan, descend_into_opaque: bool, g: &mut impl FnMut(&LogicalPlan) -> bool) {
    if !g(plan) {
        return;
    }
    if is_opaque(plan) && !descend_into_opaque {
        return;
    }
    for child in plan.children() {
        inspect(&child, descend_into_opaque, g);
    }
}

/// Applies `f` to every scalar expression reachable from `plan`'s own
/// `expressions()`, bottom-up within each expression tree, across the
/// whole plan tree (spec.md §4.1 "transform_expressions_up").
pub fn transform_expressions_up(
    plan: Arc<LogicalPlan>,
    f: &mut impl FnMut(crate::plan::expr::ScalarExpr) -> crate::plan::expr::ScalarExpr,
) -> Arc<LogicalPlan> {
    fn rewrite_expr(
        expr: crate::plan::expr::ScalarExpr,
        f: &mut impl FnMut(crate::plan::expr::ScalarExpr) -> crate::plan::expr::ScalarExpr,
    ) -> crate::plan::expr::ScalarExpr {
        let children: Vec<_> = expr
            .children()
            .into_iter()
            .cloned()
            .map(|c| rewrite_expr(c, f))
            .collect();
        let rebuilt = if children.is_empty() {
            expr
        } else {
            expr.with_children(children)
        };
        f(rebuilt)
    }

    let children: Vec<Arc<LogicalPlan>> = plan
        .children()
        .into_iter()
        .map(|c| transform_expressions_up(c, f))
        .collect();
    let plan = if children.is_empty() {
        plan
    } else {
        Arc::new(
            plan.with_children(children)
                .expect("transform_expressions_up preserves child arity"),
        )
    };

    let exprs = plan.expressions();
    if exprs.is_empty() {
        return plan;
    }
    let new_exprs: Vec<_> = exprs.into_iter().map(|e| rewrite_expr(e, f)).collect();
    Arc::new(
        plan.with_expressions(new_exprs)
            .expect("transform_expressions_up preserves expression arity"),
    )
}
