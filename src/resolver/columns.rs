//! Column resolution (spec.md §4.4 algorithms 2 and 6).
//!
//! A single "column to GetField" pass lives here: it turns every qualified/
//! unqualified reference into a concrete position, deferring what still
//! can't be settled. Disambiguating a bare column against the single
//! matching table is `ScopeStack::resolve_unqualified`'s job, not a
//! separate pre-pass — it already reports `AmbiguousColumnName` itself.

use crate::plan::{ColumnDescriptor, ScalarExpr, Schema};
use crate::resolver::errors::ResolverError;
use crate::scope::{ColumnLookup, ScopeStack};

/// Turn a `ColumnLookup::Resolved` into a concrete `GetField`, reading the
/// descriptor out of the frame at `frame_depth`.
fn get_field_from_lookup(scope: &ScopeStack, lookup: ColumnLookup, fallback_name: &str) -> ScalarExpr {
    match lookup {
        ColumnLookup::Deferred => crate::scope::defer(fallback_name, None),
        ColumnLookup::Resolved {
            frame_depth,
            index,
            descriptor_index,
        } => {
            let frame = &scope.outer_to_inner()[frame_depth];
            let descriptor = &frame.visible_schema.columns()[descriptor_index];
            ScalarExpr::GetField {
                index,
                sql_type: descriptor.sql_type,
                table: descriptor.source_table.clone(),
                name: descriptor.name.clone(),
                nullable: descriptor.nullable,
            }
        }
    }
}

/// Resolve one column reference against the scope stack (spec.md §4.4
/// bullet 2 visibility rule, reused by the later "column to GetField" pass
/// for whatever a qualification-only pass left unqualified). Also retries a
/// `DeferredColumn` left behind by an earlier iteration, so a column whose
/// producing scope wasn't available yet gets picked up once it is (spec.md
/// §9 "later passes revisit").
pub fn resolve_column(scope: &ScopeStack, expr: &ScalarExpr) -> Result<ScalarExpr, ResolverError> {
    match expr {
        ScalarExpr::UnresolvedColumn { name } => {
            let lookup = scope.resolve_unqualified(name)?;
            Ok(get_field_from_lookup(scope, lookup, name))
        }
        ScalarExpr::UnresolvedQualifiedColumn { table, name } => {
            let lookup = scope.resolve_qualified(table, name)?;
            Ok(get_field_from_lookup(scope, lookup, name))
        }
        ScalarExpr::DeferredColumn { name, table: None } => {
            let lookup = scope.resolve_unqualified(name)?;
            Ok(get_field_from_lookup(scope, lookup, name))
        }
        ScalarExpr::DeferredColumn { name, table: Some(table) } => {
            let lookup = scope.resolve_qualified(table, name)?;
            Ok(get_field_from_lookup(scope, lookup, name))
        }
        other => Ok(other.clone()),
    }
}

/// Column-to-GetField resolution pass (spec.md §4.6): rewrite every
/// `UnresolvedColumn`/`UnresolvedQualifiedColumn` reachable from a node's
/// own expressions, deferring what the scope can't yet settle rather than
/// erroring, so a later pass (after more of the tree has resolved) gets
/// another chance.
pub fn resolve_columns_in_expr(scope: &ScopeStack, expr: &ScalarExpr) -> Result<ScalarExpr, ResolverError> {
    let children: Result<Vec<ScalarExpr>, ResolverError> = expr
        .children()
        .into_iter()
        .map(|c| resolve_columns_in_expr(scope, c))
        .collect();
    let children = children?;
    let rebuilt = if children.is_empty() {
        expr.clone()
    } else {
        expr.with_children(children)
    };
    resolve_column(scope, &rebuilt)
}

/// The output column a single resolved projection item produces. A bare
/// `GetField`/`Alias` keeps its name; anything else (an unaliased
/// arithmetic expression, function call, literal, ...) falls back to the
/// placeholder name most engines use for an unnamed computed column.
fn column_descriptor_for(item: &ScalarExpr) -> ColumnDescriptor {
    match item {
        ScalarExpr::GetField { sql_type, table, name, nullable, .. } => {
            let mut d = ColumnDescriptor::new(name, *sql_type, *nullable);
            d.source_table = table.clone();
            d
        }
        ScalarExpr::Alias { name, child } => ColumnDescriptor::new(name, child.sql_type(), child.is_nullable()),
        ScalarExpr::ResolvedFunction { name, .. } => ColumnDescriptor::new(name, item.sql_type(), item.is_nullable()),
        _ => ColumnDescriptor::new("?column?", item.sql_type(), item.is_nullable()),
    }
}

/// Derive a `Project`'s output schema from its resolved items (spec.md §4.6
/// "derive Project output schema"). Only meaningful once every item is
/// resolved; callers gate on `ScalarExpr::is_resolved` first.
pub fn projected_schema(items: &[ScalarExpr]) -> Schema {
    Schema::new(items.iter().map(column_descriptor_for).collect())
}

/// The final pass-over check (spec.md §4.4 bullet 2): a `DeferredColumn`
/// that survives a full pass over the default batch with nothing left to
/// resolve it against is a hard error.
pub fn reject_unresolved_deferred(expr: &ScalarExpr) -> Result<(), ResolverError> {
    match expr {
        ScalarExpr::DeferredColumn { name, table } => {
            let qualified = match table {
                Some(t) => format!("{t}.{name}"),
                None => name.clone(),
            };
            Err(ResolverError::TableColumnNotFound(qualified))
        }
        other => {
            for child in other.children() {
                reject_unresolved_deferred(child)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::expr::SqlType;
    use crate::plan::ColumnDescriptor;
    use crate::scope::Frame;

    fn scope_with_one_table() -> ScopeStack {
        let mut schema = Schema::empty();
        schema.push(ColumnDescriptor::new("id", SqlType::Int64, false).with_source_table("users"));
        schema.push(ColumnDescriptor::new("name", SqlType::Text, true).with_source_table("users"));
        let mut scope = ScopeStack::new();
        scope.push(Frame::new(schema));
        scope
    }

    #[test]
    fn resolves_unqualified_column_to_get_field() {
        let scope = scope_with_one_table();
        let resolved = resolve_column(&scope, &ScalarExpr::UnresolvedColumn { name: "id".into() }).unwrap();
        assert_eq!(
            resolved,
            ScalarExpr::GetField {
                index: 0,
                sql_type: SqlType::Int64,
                table: Some("users".into()),
                name: "id".into(),
                nullable: false,
            }
        );
    }

    #[test]
    fn unresolved_name_defers_instead_of_erroring() {
        let scope = scope_with_one_table();
        let resolved = resolve_column(&scope, &ScalarExpr::UnresolvedColumn { name: "ghost".into() }).unwrap();
        assert_eq!(
            resolved,
            ScalarExpr::DeferredColumn {
                name: "ghost".into(),
                table: None,
            }
        );
    }

    #[test]
    fn deferred_column_resolves_once_scope_catches_up() {
        let scope = scope_with_one_table();
        let deferred = ScalarExpr::DeferredColumn {
            name: "id".into(),
            table: None,
        };
        let resolved = resolve_column(&scope, &deferred).unwrap();
        assert_eq!(
            resolved,
            ScalarExpr::GetField {
                index: 0,
                sql_type: SqlType::Int64,
                table: Some("users".into()),
                name: "id".into(),
                nullable: false,
            }
        );
    }

    #[test]
    fn deferred_column_surviving_to_final_pass_errors() {
        let expr = ScalarExpr::DeferredColumn {
            name: "ghost".into(),
            table: None,
        };
        let err = reject_unresolved_deferred(&expr).unwrap_err();
        assert!(matches!(err, ResolverError::TableColumnNotFound(_)));
    }
}
