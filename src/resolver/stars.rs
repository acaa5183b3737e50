//! Star expansion (spec.md §4.4 algorithm, `Star`/`QualifiedStar`).
//!
//! `SELECT *` and `SELECT t.*` are expanded against the input's output
//! schema before any other `Project` item is resolved, since later passes
//! (column qualification, GetField resolution) need a concrete item list
//! to work with.

use crate::plan::{ScalarExpr, Schema};
use crate::resolver::errors::ResolverError;

/// Expand a `Project`'s `items` list in place: every `Star` becomes one
/// `GetField` per schema column, every `QualifiedStar { table }` becomes
/// one `GetField` per column sourced from that table (in schema order).
pub fn expand_stars(items: &[ScalarExpr], input_schema: &Schema) -> Result<Vec<ScalarExpr>, ResolverError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            ScalarExpr::Star => {
                for (index, descriptor) in input_schema.columns().iter().enumerate() {
                    out.push(ScalarExpr::GetField {
                        index,
                        sql_type: descriptor.sql_type,
                        table: descriptor.source_table.clone(),
                        name: descriptor.name.clone(),
                        nullable: descriptor.nullable,
                    });
                }
            }
            ScalarExpr::QualifiedStar { table } => {
                let matches = input_schema.columns_for_table(table);
                if matches.is_empty() {
                    return Err(ResolverError::UnknownStarQualifier(table.clone()));
                }
                for (index, descriptor) in matches {
                    out.push(ScalarExpr::GetField {
                        index,
                        sql_type: descriptor.sql_type,
                        table: descriptor.source_table.clone(),
                        name: descriptor.name.clone(),
                        nullable: descriptor.nullable,
                    });
                }
            }
            other => out.push(other.clone()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::expr::SqlType;
    use crate::plan::ColumnDescriptor;

    fn two_table_schema() -> Schema {
        let mut schema = Schema::empty();
        schema.push(ColumnDescriptor::new("id", SqlType::Int64, false).with_source_table("users"));
        schema.push(ColumnDescriptor::new("name", SqlType::Text, true).with_source_table("users"));
        schema.push(ColumnDescriptor::new("id", SqlType::Int64, false).with_source_table("orders"));
        schema
    }

    #[test]
    fn star_expands_to_every_column() {
        let schema = two_table_schema();
        let expanded = expand_stars(&[ScalarExpr::Star], &schema).unwrap();
        assert_eq!(expanded.len(), 3);
    }

    #[test]
    fn qualified_star_expands_to_one_tables_columns() {
        let schema = two_table_schema();
        let expanded = expand_stars(
            &[ScalarExpr::QualifiedStar { table: "orders".into() }],
            &schema,
        )
        .unwrap();
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn unknown_qualifier_errors() {
        let schema = two_table_schema();
        let err = expand_stars(
            &[ScalarExpr::QualifiedStar { table: "ghost".into() }],
            &schema,
        )
        .unwrap_err();
        assert!(matches!(err, ResolverError::UnknownStarQualifier(_)));
    }
}
