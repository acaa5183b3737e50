use query_analyzer::plan::expr::SqlType;
use query_analyzer::plan::ColumnDescriptor;
use query_analyzer::plan::Schema;
use query_analyzer::scope::{ColumnLookup, Frame, ScopeStack};

fn schema_with(names: &[&str]) -> Schema {
    let mut schema = Schema::empty();
    for n in names {
        schema.push(ColumnDescriptor::new(*n, SqlType::Int64, false).with_source_table("t"));
    }
    schema
}

#[test]
fn resolves_unqualified_column_in_innermost_frame_first() {
    let mut scope = ScopeStack::new();
    scope.push(Frame::new(schema_with(&["a"])));
    scope.push(Frame::new(schema_with(&["b"])));

    match scope.resolve_unqualified("b").unwrap() {
        ColumnLookup::Resolved { frame_depth, .. } => assert_eq!(frame_depth, 1),
        ColumnLookup::Deferred => panic!("expected a resolved column"),
    }
}

#[test]
fn unqualified_lookup_falls_through_outer_frames() {
    let mut scope = ScopeStack::new();
    scope.push(Frame::new(schema_with(&["a"])));
    scope.push(Frame::new(schema_with(&["b"])));

    match scope.resolve_unqualified("a").unwrap() {
        ColumnLookup::Resolved { frame_depth, .. } => assert_eq!(frame_depth, 0),
        ColumnLookup::Deferred => panic!("expected a resolved column"),
    }
}

#[test]
fn unresolvable_unqualified_column_defers_rather_than_errors() {
    let mut scope = ScopeStack::new();
    scope.push(Frame::new(schema_with(&["a"])));

    assert!(matches!(scope.resolve_unqualified("ghost").unwrap(), ColumnLookup::Deferred));
}

#[test]
fn ambiguous_unqualified_column_in_same_frame_errors() {
    let mut scope = ScopeStack::new();
    scope.push(Frame::new(schema_with(&["a", "a"])));

    assert!(scope.resolve_unqualified("a").is_err());
}
