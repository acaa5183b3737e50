//! Function resolution (spec.md §4.4 algorithm, `UnresolvedFunction`).
//!
//! Resolves a function call against the catalog's signature registry,
//! checking arity and carrying the aggregate flag forward so later passes
//! (aggregation flattening, HAVING resolution) can tell an aggregate call
//! apart from a scalar one without re-querying the catalog.

use crate::catalog::Catalog;
use crate::plan::ScalarExpr;
use crate::resolver::errors::ResolverError;

pub fn resolve_function(catalog: &dyn Catalog, expr: ScalarExpr) -> Result<ScalarExpr, ResolverError> {
    match expr {
        ScalarExpr::UnresolvedFunction {
            name,
            args,
            is_distinct,
        } => {
            let sig = catalog.function(&name)?;
            check_arity(&sig, &args)?;
            Ok(ScalarExpr::ResolvedFunction {
                name: sig.name,
                args,
                is_aggregate: sig.is_aggregate,
                is_distinct,
                sql_type: crate::plan::expr::SqlType::Unknown,
            })
        }
        other => Ok(other),
    }
}

fn check_arity(sig: &crate::catalog::FunctionSignature, args: &[ScalarExpr]) -> Result<(), ResolverError> {
    let given = args.len();
    let fits = given >= sig.min_args && sig.max_args.map(|max| given <= max).unwrap_or(true);
    if fits {
        Ok(())
    } else {
        Err(ResolverError::UnsupportedFeature(format!(
            "function '{}' called with {} argument(s), expected between {} and {}",
            sig.name,
            given,
            sig.min_args,
            sig.max_args.map(|m| m.to_string()).unwrap_or_else(|| "unbounded".into()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::catalog::FunctionSignature;
    use crate::plan::expr::Literal;

    #[test]
    fn resolves_known_function_and_carries_aggregate_flag() {
        let cat = MemoryCatalog::new();
        cat.add_function(FunctionSignature {
            name: "count".into(),
            is_aggregate: true,
            min_args: 1,
            max_args: Some(1),
        });
        let expr = ScalarExpr::UnresolvedFunction {
            name: "count".into(),
            args: vec![ScalarExpr::Literal(Literal::Int64(1))],
            is_distinct: false,
        };
        let resolved = resolve_function(&cat, expr).unwrap();
        assert!(matches!(
            resolved,
            ScalarExpr::ResolvedFunction { is_aggregate: true, .. }
        ));
    }

    #[test]
    fn unknown_function_propagates_catalog_error() {
        let cat = MemoryCatalog::new();
        let expr = ScalarExpr::UnresolvedFunction {
            name: "ghost".into(),
            args: vec![],
            is_distinct: false,
        };
        let err = resolve_function(&cat, expr).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::Catalog(crate::catalog::CatalogError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn arity_mismatch_errors() {
        let cat = MemoryCatalog::new();
        cat.add_function(FunctionSignature {
            name: "count".into(),
            is_aggregate: true,
            min_args: 1,
            max_args: Some(1),
        });
        let expr = ScalarExpr::UnresolvedFunction {
            name: "count".into(),
            args: vec![],
            is_distinct: false,
        };
        let err = resolve_function(&cat, expr).unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedFeature(_)));
    }
}
