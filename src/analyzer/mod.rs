//! Analyzer driver (spec.md §4.8/§6, "C8" in the system overview).
//!
//! Wires the rule batches together in a fixed phase order and exposes the
//! three entry points the rest of the system calls: `analyze` for a fresh
//! unresolved plan, `prepare` for a plan containing `BindVar` placeholders
//! that should resolve but not yet execute, and `analyze_prepared` for
//! re-analyzing a previously prepared plan against fresh bind values.

pub mod errors;

pub use errors::AnalyzerError;

use std::sync::Arc;

use crate::catalog::{Catalog, SessionContext};
use crate::config::AnalyzerConfig;
use crate::plan::LogicalPlan;
use crate::rules::{once_after, once_before, default, Batch, Rule, RuleContext, RuleSelector};
use crate::scope::ScopeStack;
use crate::validate;

/// Every rule this crate knows how to build, regardless of which batch it
/// defaults into; `rule_overrides` (spec.md §10.3) can `add` one of these
/// into a batch it doesn't normally run in, or `remove` it from the one it
/// does.
fn all_known_rules() -> Vec<Box<dyn Rule>> {
    once_before::rules()
        .into_iter()
        .chain(default::rules())
        .chain(once_after::rules())
        .collect()
}

fn apply_overrides(batch_name: &str, mut rules: Vec<Box<dyn Rule>>, config: &AnalyzerConfig) -> Vec<Box<dyn Rule>> {
    let Some(overrides) = config.rules_for_batch(batch_name) else {
        return rules;
    };
    rules.retain(|r| !overrides.remove.iter().any(|n| n == r.name()));
    for name in &overrides.add {
        if rules.iter().any(|r| r.name() == name) {
            continue;
        }
        if let Some(rule) = all_known_rules().into_iter().find(|r| r.name() == name) {
            rules.push(rule);
        }
    }
    rules
}

/// Built once per catalog/config pairing and reused across queries,
/// mirroring `clickgraph`'s `AnalyzerPass` pipeline construction (spec.md
/// §6 "A context exposing...").
pub struct Analyzer {
    once_before: Batch,
    default: Batch,
    once_after: Batch,
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn build(config: AnalyzerConfig) -> Self {
        let once_before = Batch::once("once_before", apply_overrides("once_before", once_before::rules(), &config));
        let default = Batch::fixed_point(
            "default",
            config.max_analysis_iters,
            apply_overrides("default", default::rules(), &config),
        );
        let once_after = Batch::once("once_after", apply_overrides("once_after", once_after::rules(), &config));
        Analyzer {
            once_before,
            default,
            once_after,
            config,
        }
    }

    fn run_batches(
        &self,
        catalog: &dyn Catalog,
        session: &mut SessionContext,
        plan: Arc<LogicalPlan>,
        selector: RuleSelector,
    ) -> Result<Arc<LogicalPlan>, AnalyzerError> {
        let mut ctx = RuleContext {
            catalog,
            session,
            scope: ScopeStack::new(),
            config: &self.config,
        };
        let plan = self.once_before.run(plan, &mut ctx, selector)?;
        let plan = self.default.run(plan, &mut ctx, selector)?;
        let plan = self.once_after.run(plan, &mut ctx, selector)?;
        Ok(plan)
    }

    fn validate(&self, plan: &LogicalPlan, session: &SessionContext) -> Result<(), AnalyzerError> {
        validate::validate_resolved(plan)?;
        validate::validate_order_by(plan)?;
        validate::validate_group_by(plan, session.sql_mode_relaxed_group_by)?;
        validate::validate_union_schemas_match(plan)?;
        validate::validate_operands(plan)?;
        validate::validate_aggregations(plan)?;
        validate::validate_subquery_columns(plan)?;
        validate::validate_check_constraints(plan)?;
        Ok(())
    }

    /// Full analysis of a fresh, unresolved plan (spec.md §6 `analyze`).
    pub fn analyze(
        &self,
        catalog: &dyn Catalog,
        session: &mut SessionContext,
        plan: Arc<LogicalPlan>,
    ) -> Result<Arc<LogicalPlan>, AnalyzerError> {
        log::info!("starting full analysis");
        let resolved = self.run_batches(catalog, session, plan, RuleSelector::FullAnalysis)?;
        self.validate(&resolved, session)?;
        session.warnings.clear();
        log::info!("analysis complete");
        Ok(resolved)
    }

    /// Resolve a plan containing `BindVar` placeholders without committing
    /// to concrete literal values yet (spec.md §6 `prepare`).
    pub fn prepare(
        &self,
        catalog: &dyn Catalog,
        session: &mut SessionContext,
        plan: Arc<LogicalPlan>,
    ) -> Result<Arc<LogicalPlan>, AnalyzerError> {
        if self.config.prepared_statements_disabled {
            return Err(AnalyzerError::PreparedStatementsDisabled);
        }
        log::info!("preparing statement");
        let resolved = self.run_batches(catalog, session, plan, RuleSelector::PrepareQuery)?;
        self.validate(&resolved, session)?;
        Ok(resolved)
    }

    /// Re-run analysis over a plan that was already `prepare`d, now that
    /// bind values are known (spec.md §6 `analyze_prepared`).
    pub fn analyze_prepared(
        &self,
        catalog: &dyn Catalog,
        session: &mut SessionContext,
        plan: Arc<LogicalPlan>,
    ) -> Result<Arc<LogicalPlan>, AnalyzerError> {
        if self.config.prepared_statements_disabled {
            return Err(AnalyzerError::PreparedStatementsDisabled);
        }
        log::info!("analyzing prepared statement");
        let resolved = self.run_batches(catalog, session, plan, RuleSelector::AnalyzePrepared)?;
        self.validate(&resolved, session)?;
        session.warnings.clear();
        Ok(resolved)
    }
}
