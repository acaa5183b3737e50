//! Table resolution (spec.md §4.4 algorithm 1).

use crate::catalog::{resolved_table_from, Catalog, SessionContext};
use crate::plan::{LogicalPlan, ScalarExpr};
use crate::resolver::errors::ResolverError;

/// Resolve a single `UnresolvedTable` against the catalog, substituting a
/// view's stored body and propagating the call site's `AS OF` binding into
/// every unresolved table inside it (spec.md §4.4 algorithm 1).
pub fn resolve_table(
    catalog: &dyn Catalog,
    ctx: &SessionContext,
    database: Option<&str>,
    name: &str,
    as_of: Option<&ScalarExpr>,
) -> Result<LogicalPlan, ResolverError> {
    let db_name = match database {
        Some(d) => d.to_string(),
        None => ctx
            .current_database
            .clone()
            .ok_or(crate::catalog::CatalogError::NoDatabaseSelected)?,
    };

    if let Ok(view) = catalog.view(&db_name, name) {
        return propagate_as_of_into_view(view.body, as_of);
    }

    let table = catalog.table(ctx, &db_name, name)?;
    Ok(resolved_table_from(&table, as_of.cloned()))
}

/// Push `as_of` into every `UnresolvedTable` in `body`. Rejects re-binding
/// a view that already carries its own `AS OF` (spec.md §4.4 algorithm 1,
/// error `ErrIncompatibleAsOf`).
fn propagate_as_of_into_view(
    body: LogicalPlan,
    as_of: Option<&ScalarExpr>,
) -> Result<LogicalPlan, ResolverError> {
    let as_of = match as_of {
        None => return Ok(body),
        Some(e) => e.clone(),
    };

    fn rewrite(node: LogicalPlan, as_of: &ScalarExpr) -> Result<LogicalPlan, ResolverError> {
        match node {
            LogicalPlan::UnresolvedTable {
                database,
                name,
                as_of: existing,
            } => {
                if existing.is_some() {
                    return Err(ResolverError::IncompatibleAsOf);
                }
                Ok(LogicalPlan::UnresolvedTable {
                    database,
                    name,
                    as_of: Some(as_of.clone()),
                })
            }
            other => {
                let children: Result<Vec<_>, ResolverError> = other
                    .children()
                    .into_iter()
                    .map(|c| rewrite((*c).clone(), as_of).map(std::sync::Arc::new))
                    .collect();
                let children = children?;
                if children.is_empty() {
                    Ok(other)
                } else {
                    other
                        .with_children(children)
                        .map_err(|e| ResolverError::UnsupportedFeature(e.to_string()))
                }
            }
        }
    }

    rewrite(body, &as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::catalog::Table;
    use crate::plan::Schema;

    fn catalog_with_table() -> MemoryCatalog {
        let cat = MemoryCatalog::new();
        cat.add_database("db");
        cat.add_table(Table {
            database: "db".into(),
            name: "users".into(),
            schema: Schema::empty(),
            foreign_keys: None,
            indexes: vec![],
            check_constraints: vec![],
            auto_increment_column: None,
            has_delete_trigger: false,
        });
        cat
    }

    #[test]
    fn resolves_table_in_current_database() {
        let cat = catalog_with_table();
        let ctx = SessionContext::new(Some("db".into()));
        let resolved = resolve_table(&cat, &ctx, None, "users", None).unwrap();
        assert!(matches!(resolved, LogicalPlan::ResolvedTable { .. }));
    }

    #[test]
    fn missing_database_selected_errors() {
        let cat = catalog_with_table();
        let ctx = SessionContext::new(None);
        let err = resolve_table(&cat, &ctx, None, "users", None).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::Catalog(crate::catalog::CatalogError::NoDatabaseSelected)
        ));
    }

    #[test]
    fn view_rejects_double_as_of_binding() {
        let cat = catalog_with_table();
        cat.add_view(crate::catalog::ViewDefinition {
            database: "db".into(),
            name: "v".into(),
            body: LogicalPlan::UnresolvedTable {
                database: Some("db".into()),
                name: "users".into(),
                as_of: Some(ScalarExpr::Literal(crate::plan::expr::Literal::Int64(1))),
            },
        });
        let ctx = SessionContext::new(Some("db".into()));
        let err = resolve_table(
            &cat,
            &ctx,
            None,
            "v",
            Some(&ScalarExpr::Literal(crate::plan::expr::Literal::Int64(2))),
        )
        .unwrap_err();
        assert_eq!(err, ResolverError::IncompatibleAsOf);
    }
}
