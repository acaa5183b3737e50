//! Scalar expression tree (spec.md §3 "Scalar expression").
//!
//! Expressions carry a computed SQL type once resolved and a nullability
//! flag, mirroring the way `clickgraph`'s `LogicalExpr` enum carries
//! resolution metadata alongside each variant.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The handful of scalar SQL types the analyzer needs to reason about for
/// type-checking and union-schema widening. Storage/execution own the full
/// type system; the analyzer only needs enough to validate operands and
/// widen union columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Unknown,
    Null,
    Boolean,
    Int64,
    Float64,
    Decimal { precision: u8, scale: u8 },
    Text,
    Blob,
    Date,
    DateTime,
    Tuple,
}

impl SqlType {
    /// Widen two column types to a common type for UNION schema merging
    /// (spec.md §4.6 "merge UNION schemas"). Numeric types widen toward
    /// float/decimal; anything incompatible widens to `Text` the way a SQL
    /// engine coerces mismatched UNION branches to a printable common type.
    pub fn widen(self, other: SqlType) -> SqlType {
        use SqlType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, other) | (other, Null) => other,
            (Unknown, other) | (other, Unknown) => other,
            (Int64, Float64) | (Float64, Int64) => Float64,
            (Int64, Decimal { precision, scale }) | (Decimal { precision, scale }, Int64) => {
                Decimal { precision, scale }
            }
            _ => Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Text(String),
}

impl Literal {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Literal::Null => SqlType::Null,
            Literal::Boolean(_) => SqlType::Boolean,
            Literal::Int64(_) => SqlType::Int64,
            Literal::Float64(_) => SqlType::Float64,
            Literal::Text(_) => SqlType::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// A scalar expression node (spec.md §3).
///
/// `UnresolvedColumn`/`UnresolvedQualifiedColumn`/`UnresolvedFunction` are
/// replaced by resolved counterparts during name resolution (§4.4);
/// `DeferredColumn` is the best-effort-with-deferral wrapper (§4.4 bullet 2,
/// §9 "Deferred resolution").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarExpr {
    Literal(Literal),

    /// An unqualified column reference, e.g. `x` in `SELECT x FROM t`.
    UnresolvedColumn { name: String },

    /// A qualified column reference, e.g. `t.x`.
    UnresolvedQualifiedColumn { table: String, name: String },

    /// A resolved column reference: a position into the row assembled by
    /// the nearest producing node under current scope.
    GetField {
        index: usize,
        sql_type: SqlType,
        table: Option<String>,
        name: String,
        nullable: bool,
    },

    /// A column reference that could not be resolved on the current pass.
    /// Revisited by a later resolver pass (spec.md §4.4, §9).
    DeferredColumn {
        name: String,
        table: Option<String>,
    },

    Alias {
        name: String,
        child: Box<ScalarExpr>,
    },

    Star,
    QualifiedStar { table: String },

    And(Box<ScalarExpr>, Box<ScalarExpr>),
    Or(Box<ScalarExpr>, Box<ScalarExpr>),
    Not(Box<ScalarExpr>),

    Comparison {
        op: Comparator,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },

    Arithmetic {
        op: ArithOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },

    Convert {
        target: SqlType,
        child: Box<ScalarExpr>,
    },

    IsNull(Box<ScalarExpr>),
    IsTrue(Box<ScalarExpr>),

    InTuple {
        needle: Box<ScalarExpr>,
        haystack: Vec<ScalarExpr>,
    },

    /// A hash-friendly rewrite of `InTuple` once every haystack element is a
    /// literal (spec.md §4.6 "apply hash-based IN").
    HashInTuple {
        needle: Box<ScalarExpr>,
        haystack: Arc<Vec<Literal>>,
    },

    Tuple(Vec<ScalarExpr>),

    UnresolvedFunction {
        name: String,
        args: Vec<ScalarExpr>,
        is_distinct: bool,
    },

    ResolvedFunction {
        name: String,
        args: Vec<ScalarExpr>,
        is_aggregate: bool,
        is_distinct: bool,
        sql_type: SqlType,
    },

    /// A scalar or EXISTS subquery; the child plan is boxed behind `Arc` by
    /// the plan module to avoid a dependency cycle between `expr` and `plan`.
    Subquery(crate::plan::SubqueryExpr),

    BindVar { index: usize },

    UserVar { name: String },

    SystemVar { name: String, is_global: bool },
}

impl ScalarExpr {
    pub fn sql_type(&self) -> SqlType {
        match self {
            ScalarExpr::Literal(l) => l.sql_type(),
            ScalarExpr::GetField { sql_type, .. } => *sql_type,
            ScalarExpr::ResolvedFunction { sql_type, .. } => *sql_type,
            ScalarExpr::Comparison { .. }
            | ScalarExpr::IsNull(_)
            | ScalarExpr::IsTrue(_)
            | ScalarExpr::And(..)
            | ScalarExpr::Or(..)
            | ScalarExpr::Not(_)
            | ScalarExpr::InTuple { .. }
            | ScalarExpr::HashInTuple { .. } => SqlType::Boolean,
            ScalarExpr::Convert { target, .. } => *target,
            ScalarExpr::Alias { child, .. } => child.sql_type(),
            _ => SqlType::Unknown,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            ScalarExpr::GetField { nullable, .. } => *nullable,
            ScalarExpr::Literal(Literal::Null) => true,
            ScalarExpr::Alias { child, .. } => child.is_nullable(),
            _ => false,
        }
    }

    /// True once every unresolved/deferred variant has been replaced. Used
    /// by `validate_resolved` (spec.md §4.7).
    pub fn is_resolved(&self) -> bool {
        match self {
            ScalarExpr::UnresolvedColumn { .. }
            | ScalarExpr::UnresolvedQualifiedColumn { .. }
            | ScalarExpr::DeferredColumn { .. }
            | ScalarExpr::UnresolvedFunction { .. } => false,
            ScalarExpr::Alias { child, .. }
            | ScalarExpr::Not(child)
            | ScalarExpr::IsNull(child)
            | ScalarExpr::IsTrue(child)
            | ScalarExpr::Convert { child, .. } => child.is_resolved(),
            ScalarExpr::And(a, b)
            | ScalarExpr::Or(a, b)
            | ScalarExpr::Comparison { left: a, right: b, .. }
            | ScalarExpr::Arithmetic { left: a, right: b, .. } => a.is_resolved() && b.is_resolved(),
            ScalarExpr::InTuple { needle, haystack } => {
                needle.is_resolved() && haystack.iter().all(ScalarExpr::is_resolved)
            }
            ScalarExpr::HashInTuple { needle, .. } => needle.is_resolved(),
            ScalarExpr::Tuple(items) => items.iter().all(ScalarExpr::is_resolved),
            ScalarExpr::ResolvedFunction { args, .. } => args.iter().all(ScalarExpr::is_resolved),
            ScalarExpr::Subquery(sq) => sq.plan.is_resolved(),
            _ => true,
        }
    }

    /// Direct scalar-expr children, for `transform_expressions_up`.
    pub fn children(&self) -> Vec<&ScalarExpr> {
        match self {
            ScalarExpr::Alias { child, .. }
            | ScalarExpr::Not(child)
            | ScalarExpr::IsNull(child)
            | ScalarExpr::IsTrue(child)
            | ScalarExpr::Convert { child, .. } => vec![child],
            ScalarExpr::And(a, b)
            | ScalarExpr::Or(a, b)
            | ScalarExpr::Comparison { left: a, right: b, .. }
            | ScalarExpr::Arithmetic { left: a, right: b, .. } => vec![a, b],
            ScalarExpr::InTuple { needle, haystack } => {
                let mut v = vec![needle.as_ref()];
                v.extend(haystack.iter());
                v
            }
            ScalarExpr::HashInTuple { needle, .. } => vec![needle],
            ScalarExpr::Tuple(items) => items.iter().collect(),
            ScalarExpr::UnresolvedFunction { args, .. } => args.iter().collect(),
            ScalarExpr::ResolvedFunction { args, .. } => args.iter().collect(),
            _ => vec![],
        }
    }

    pub fn with_children(&self, mut new_children: Vec<ScalarExpr>) -> ScalarExpr {
        match self {
            ScalarExpr::Alias { name, .. } => ScalarExpr::Alias {
                name: name.clone(),
                child: Box::new(new_children.remove(0)),
            },
            ScalarExpr::Not(_) => ScalarExpr::Not(Box::new(new_children.remove(0))),
            ScalarExpr::IsNull(_) => ScalarExpr::IsNull(Box::new(new_children.remove(0))),
            ScalarExpr::IsTrue(_) => ScalarExpr::IsTrue(Box::new(new_children.remove(0))),
            ScalarExpr::Convert { target, .. } => ScalarExpr::Convert {
                target: *target,
                child: Box::new(new_children.remove(0)),
            },
            ScalarExpr::And(..) => {
                let b = new_children.remove(1);
                let a = new_children.remove(0);
                ScalarExpr::And(Box::new(a), Box::new(b))
            }
            ScalarExpr::Or(..) => {
                let b = new_children.remove(1);
                let a = new_children.remove(0);
                ScalarExpr::Or(Box::new(a), Box::new(b))
            }
            ScalarExpr::Comparison { op, .. } => {
                let right = new_children.remove(1);
                let left = new_children.remove(0);
                ScalarExpr::Comparison {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            ScalarExpr::Arithmetic { op, .. } => {
                let right = new_children.remove(1);
                let left = new_children.remove(0);
                ScalarExpr::Arithmetic {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            ScalarExpr::InTuple { .. } => {
                let needle = new_children.remove(0);
                ScalarExpr::InTuple {
                    needle: Box::new(needle),
                    haystack: new_children,
                }
            }
            ScalarExpr::HashInTuple { haystack, .. } => ScalarExpr::HashInTuple {
                needle: Box::new(new_children.remove(0)),
                haystack: haystack.clone(),
            },
            ScalarExpr::Tuple(_) => ScalarExpr::Tuple(new_children),
            ScalarExpr::UnresolvedFunction {
                name, is_distinct, ..
            } => ScalarExpr::UnresolvedFunction {
                name: name.clone(),
                args: new_children,
                is_distinct: *is_distinct,
            },
            ScalarExpr::ResolvedFunction {
                name,
                is_aggregate,
                is_distinct,
                sql_type,
                ..
            } => ScalarExpr::ResolvedFunction {
                name: name.clone(),
                args: new_children,
                is_aggregate: *is_aggregate,
                is_distinct: *is_distinct,
                sql_type: *sql_type,
            },
            other => other.clone(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ScalarExpr::ResolvedFunction { is_aggregate: true, .. })
    }

    /// True if the expression tree contains a `Subquery`. Used by the filter
    /// set (spec.md §3 "a conjunct containing a subquery is never
    /// partitioned").
    pub fn contains_subquery(&self) -> bool {
        matches!(self, ScalarExpr::Subquery(_)) || self.children().iter().any(|c| c.contains_subquery())
    }

    /// Every distinct `(table, name)` qualified column reference touched by
    /// this expression, used to partition filter conjuncts by table
    /// (spec.md §3 "Filter set", §4.6 "pushdown filters").
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables = Vec::new();
        self.collect_referenced_tables(&mut tables);
        tables.sort();
        tables.dedup();
        tables
    }

    fn collect_referenced_tables(&self, out: &mut Vec<String>) {
        match self {
            ScalarExpr::GetField { table: Some(t), .. }
            | ScalarExpr::UnresolvedQualifiedColumn { table: t, .. } => out.push(t.clone()),
            _ => {}
        }
        for child in self.children() {
            child.collect_referenced_tables(out);
        }
    }
}

/// A scalar or `EXISTS` subquery expression. Kept out of `ScalarExpr`'s own
/// definition to avoid a direct `plan::LogicalPlan` dependency cycle in the
/// enum derive; `plan::mod` defines `SubqueryExpr` and re-exports it here.
pub type BoxedPlan = Arc<crate::plan::LogicalPlan>;
