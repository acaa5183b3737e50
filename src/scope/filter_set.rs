//! Filter set (spec.md §3 "Filter set").
//!
//! Tracks, for one `Filter` node, the conjuncts partitioned by the set of
//! tables each references, plus which conjuncts have already been "handled"
//! by a pushdown or index decision so the residual filter can be computed.

use std::collections::HashMap;

use crate::plan::ScalarExpr;

/// Split a top-level AND-expression into its conjuncts (spec.md GLOSSARY
/// "Conjunct": one operand of a top-level AND in a Filter expression).
pub fn split_conjuncts(predicate: &ScalarExpr) -> Vec<ScalarExpr> {
    match predicate {
        ScalarExpr::And(l, r) => {
            let mut v = split_conjuncts(l);
            v.extend(split_conjuncts(r));
            v
        }
        other => vec![other.clone()],
    }
}

/// Re-combine conjuncts into a single AND-expression (the inverse of
/// `split_conjuncts`, used once pushdown/residual computation is done).
pub fn combine_conjuncts(mut conjuncts: Vec<ScalarExpr>) -> Option<ScalarExpr> {
    if conjuncts.is_empty() {
        return None;
    }
    let mut acc = conjuncts.remove(0);
    for c in conjuncts {
        acc = ScalarExpr::And(Box::new(acc), Box::new(c));
    }
    Some(acc)
}

#[derive(Debug, Clone)]
pub struct FilterSet {
    /// Conjuncts that touch exactly one table, keyed by that table's name.
    single_table: HashMap<String, Vec<ScalarExpr>>,
    /// Conjuncts that touch more than one table (or none — e.g. `1 = 1`).
    multi_table: Vec<ScalarExpr>,
    /// Conjuncts already pushed down or folded into an index range; they
    /// are excluded from the residual filter computed by `residual()`.
    handled: Vec<ScalarExpr>,
}

impl FilterSet {
    /// Partition a `Filter`'s predicate by referenced table.
    ///
    /// Invariant (spec.md §3): a conjunct containing a subquery is never
    /// partitioned — its presence forces *every* conjunct in this filter to
    /// stay at the original `Filter` level, so we short-circuit to "all
    /// multi-table, nothing handled" in that case.
    pub fn from_predicate(predicate: &ScalarExpr) -> Self {
        let conjuncts = split_conjuncts(predicate);
        if conjuncts.iter().any(ScalarExpr::contains_subquery) {
            return FilterSet {
                single_table: HashMap::new(),
                multi_table: conjuncts,
                handled: vec![],
            };
        }

        let mut single_table: HashMap<String, Vec<ScalarExpr>> = HashMap::new();
        let mut multi_table = vec![];
        for conjunct in conjuncts {
            let tables = conjunct.referenced_tables();
            match tables.as_slice() {
                [one] => single_table.entry(one.clone()).or_default().push(conjunct),
                _ => multi_table.push(conjunct),
            }
        }
        FilterSet {
            single_table,
            multi_table,
            handled: vec![],
        }
    }

    pub fn single_table_conjuncts(&self, table: &str) -> &[ScalarExpr] {
        self.single_table.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn tables_with_conjuncts(&self) -> Vec<&str> {
        self.single_table.keys().map(|s| s.as_str()).collect()
    }

    pub fn multi_table_conjuncts(&self) -> &[ScalarExpr] {
        &self.multi_table
    }

    /// Mark a conjunct handled by a pushdown/index decision so it drops out
    /// of the residual filter.
    pub fn mark_handled(&mut self, conjunct: ScalarExpr) {
        self.handled.push(conjunct);
    }

    /// The predicate still required above the rewritten plan: every
    /// conjunct (single- or multi-table) minus those marked handled.
    pub fn residual(&self) -> Option<ScalarExpr> {
        let mut remaining: Vec<ScalarExpr> = self
            .single_table
            .values()
            .flatten()
            .chain(self.multi_table.iter())
            .filter(|c| !self.handled.contains(c))
            .cloned()
            .collect();
        remaining.dedup();
        combine_conjuncts(remaining)
    }
}
