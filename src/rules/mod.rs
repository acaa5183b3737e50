//! Rule engine (spec.md §4.5/§4.6, "C5"/"C6" in the system overview).
//!
//! Mirrors `clickgraph`'s `AnalyzerPass`/`OptimizerPass` + sequential-batch
//! pipeline: every rule is a small, independently testable tree rewrite;
//! batches group rules under a fixed-point or run-once strategy and run in
//! a fixed phase order driven by the [`Analyzer`](crate::analyzer::Analyzer).

pub mod default;
pub mod errors;
pub mod once_after;
pub mod once_before;

pub use errors::RuleError;

use std::sync::Arc;

use crate::catalog::{Catalog, SessionContext};
use crate::config::AnalyzerConfig;
use crate::plan::{LogicalPlan, Transformed};
use crate::scope::ScopeStack;

/// Which top-level entry point a batch should run under (spec.md §6
/// `analyze`/`prepare`/`analyze_prepared`). A rule/batch that doesn't name
/// itself out of a selector runs under all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSelector {
    FullAnalysis,
    PrepareQuery,
    AnalyzePrepared,
}

impl RuleSelector {
    pub fn matches(self, applicable: &[RuleSelector]) -> bool {
        applicable.is_empty() || applicable.contains(&self)
    }
}

/// Threaded through every rule application: catalog access, session state,
/// and the scope stack built up as rules descend into nested scopes
/// (spec.md §6 "A context exposing...").
pub struct RuleContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub session: &'a mut SessionContext,
    pub scope: ScopeStack,
    pub config: &'a AnalyzerConfig,
}

/// One named tree rewrite (spec.md §4.6). Rules are plain bottom-up
/// rewrites over the whole plan; a rule that only fires on specific node
/// shapes simply returns `Transformed::No` for everything else.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Which entry points this rule runs under; empty means "all of them".
    fn selectors(&self) -> &'static [RuleSelector] {
        &[]
    }

    fn apply(
        &self,
        plan: Arc<LogicalPlan>,
        ctx: &mut RuleContext,
    ) -> Result<Transformed<Arc<LogicalPlan>>, RuleError>;
}

/// How a [`Batch`] is driven to completion (spec.md §4.5 "Batch").
#[derive(Debug, Clone, Copy)]
pub enum BatchStrategy {
    /// Apply every rule exactly once, in order.
    Once,
    /// Apply the full rule list repeatedly until no rule in the batch
    /// changes the tree, or `max_iters` passes are spent — whichever comes
    /// first (spec.md §4.5 "Fixed-point batch").
    FixedPoint { max_iters: usize },
}

pub struct Batch {
    pub name: &'static str,
    pub strategy: BatchStrategy,
    pub rules: Vec<Box<dyn Rule>>,
}

impl Batch {
    pub fn once(name: &'static str, rules: Vec<Box<dyn Rule>>) -> Self {
        Batch {
            name,
            strategy: BatchStrategy::Once,
            rules,
        }
    }

    pub fn fixed_point(name: &'static str, max_iters: usize, rules: Vec<Box<dyn Rule>>) -> Self {
        Batch {
            name,
            strategy: BatchStrategy::FixedPoint { max_iters },
            rules,
        }
    }

    /// Run every applicable rule over `plan`, honoring this batch's
    /// strategy. Logs at batch/iteration boundaries (spec.md §10.1), and
    /// checks cooperative cancellation once per iteration (spec.md §5).
    pub fn run(
        &self,
        mut plan: Arc<LogicalPlan>,
        ctx: &mut RuleContext,
        selector: RuleSelector,
    ) -> Result<Arc<LogicalPlan>, RuleError> {
        log::debug!("entering batch '{}'", self.name);
        let applicable: Vec<&Box<dyn Rule>> = self
            .rules
            .iter()
            .filter(|r| selector.matches(r.selectors()))
            .collect();

        let max_iters = match self.strategy {
            BatchStrategy::Once => 1,
            BatchStrategy::FixedPoint { max_iters } => max_iters,
        };

        for iteration in 0..max_iters {
            if ctx.session.cancellation.is_cancelled() {
                return Err(RuleError::Cancelled);
            }
            let mut changed_this_iter = false;
            for rule in &applicable {
                let transformed = rule.apply(plan, ctx)?;
                if transformed.changed() {
                    changed_this_iter = true;
                    log::trace!("rule '{}' rewrote the plan in batch '{}'", rule.name(), self.name);
                }
                plan = transformed.into_inner();
            }
            match self.strategy {
                BatchStrategy::Once => break,
                BatchStrategy::FixedPoint { .. } => {
                    if !changed_this_iter {
                        log::debug!("batch '{}' reached a fixed point after {} iteration(s)", self.name, iteration + 1);
                        return Ok(plan);
                    }
                }
            }
        }
        if matches!(self.strategy, BatchStrategy::FixedPoint { .. }) {
            ctx.session
                .push_warning("batch_iteration_cap", format!("batch '{}' hit its iteration cap", self.name));
            log::warn!("batch '{}' hit its iteration cap ({}) without reaching a fixed point", self.name, max_iters);
        }
        Ok(plan)
    }
}
