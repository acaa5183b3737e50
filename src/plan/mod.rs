//! Plan & expression model (spec.md §4.1, "C1" in the system overview).
//!
//! A plan node is a variant in a closed algebraic type. Nodes are
//! immutable: mutation is expressed by constructing a new node via
//! [`LogicalPlan::with_children`]/[`LogicalPlan::with_expressions`], which
//! preserve node identity on structural equality by simply returning the
//! same `Arc` when nothing actually changed (callers use [`Transformed`] to
//! track that).

pub mod errors;
pub mod expr;
pub mod schema;
pub mod transform;

pub use errors::PlanError;
pub use expr::ScalarExpr;
pub use schema::{ColumnDescriptor, Schema};
pub use transform::{inspect, is_opaque, transform_expressions_up, transform_up, Transformed};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A scalar or `EXISTS` subquery expression (spec.md §3, `ScalarExpr::Subquery`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryExpr {
    pub plan: Arc<LogicalPlan>,
    pub is_exists: bool,
    /// True once index-selection has determined this subquery is free of
    /// correlation and can be cached (spec.md §4.6 "cache subquery results
    /// that are free of correlation").
    pub correlated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub expr_index: usize,
    pub ascending: bool,
    pub nulls_first: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    /// A correlated lookup against an index (spec.md §4.6 "join plan").
    Lookup,
    /// Merge join over two inputs already sorted on the join key.
    Merge,
    Left,
    /// Right join that has *not* yet been transposed to a Left join.
    Right,
    Hash,
    Semi,
    Anti,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    /// The table that declares this constraint (the child side), so a
    /// cascade walk starting from the parent side can locate it again.
    pub child_database: String,
    pub child_table: String,
    pub columns: Vec<String>,
    pub parent_database: String,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub on_delete: RefAction,
    pub on_update: RefAction,
}

/// How to map a child row onto the parent index key used for the
/// referential point lookup (spec.md §4.6.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowMapperEntry {
    FromChildColumn(usize),
    /// The parent index needs a leading column the child row doesn't carry;
    /// append a NULL-typed placeholder (longest-prefix-match index reuse).
    NullPlaceholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyReferenceHandler {
    pub fk: ForeignKeyDef,
    pub parent_index_id: String,
    pub row_mapper: Vec<RowMapperEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyCascade {
    pub fk: ForeignKeyDef,
    pub action: RefAction,
    /// The editor for the affected child table; `None` once the recursion
    /// degrades the edge to `Restrict` at the depth cap or cycle boundary
    /// (spec.md §4.6.1).
    pub child_editor: Option<Arc<LogicalPlan>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropConstraintKind {
    Check,
    ForeignKey,
    PrimaryKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlterAction {
    AddColumn(ColumnDescriptor),
    DropColumn(String),
    ModifyColumn(ColumnDescriptor),
    AddForeignKey(ForeignKeyDef),
    DropConstraint { kind: DropConstraintKind, name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    pub expr: ScalarExpr,
}

/// The closed set of plan node variants (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    UnresolvedTable {
        database: Option<String>,
        name: String,
        as_of: Option<ScalarExpr>,
    },
    ResolvedTable {
        database: String,
        name: String,
        schema: Schema,
        as_of: Option<ScalarExpr>,
        check_constraints: Vec<CheckConstraint>,
    },
    IndexedTableAccess {
        table: Box<LogicalPlan>,
        index_id: String,
        /// Range predicates the index satisfies; kept as expressions so the
        /// residual filter can be computed precisely.
        ranges: Vec<ScalarExpr>,
        schema: Schema,
    },
    TableAlias {
        input: Arc<LogicalPlan>,
        alias: String,
    },
    SubqueryAlias {
        input: Arc<LogicalPlan>,
        alias: String,
        schema: Schema,
    },
    Project {
        input: Arc<LogicalPlan>,
        items: Vec<ScalarExpr>,
        schema: Schema,
    },
    Filter {
        input: Arc<LogicalPlan>,
        predicate: ScalarExpr,
    },
    GroupBy {
        input: Arc<LogicalPlan>,
        group_exprs: Vec<ScalarExpr>,
        aggregates: Vec<ScalarExpr>,
        schema: Schema,
    },
    Sort {
        input: Arc<LogicalPlan>,
        order_by: Vec<SortField>,
    },
    Distinct {
        input: Arc<LogicalPlan>,
    },
    /// `Distinct` optimized to a streaming dedup over an already-sorted
    /// input (spec.md §4.6 "optimize Distinct to OrderedDistinct").
    OrderedDistinct {
        input: Arc<LogicalPlan>,
    },
    Limit {
        input: Arc<LogicalPlan>,
        limit: ScalarExpr,
    },
    Offset {
        input: Arc<LogicalPlan>,
        offset: ScalarExpr,
    },
    TopN {
        input: Arc<LogicalPlan>,
        order_by: Vec<SortField>,
        limit: ScalarExpr,
    },
    CrossJoin {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
    },
    InnerJoin {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
        on: ScalarExpr,
        kind: JoinKind,
    },
    LeftJoin {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
        on: ScalarExpr,
    },
    RightJoin {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
        on: ScalarExpr,
    },
    NaturalJoin {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
    },
    Union {
        inputs: Vec<Arc<LogicalPlan>>,
        is_distinct: bool,
        schema: Schema,
    },
    Values {
        rows: Vec<Vec<ScalarExpr>>,
        schema: Schema,
    },
    InsertInto {
        target: Arc<LogicalPlan>,
        source: Arc<LogicalPlan>,
        columns: Vec<String>,
    },
    Update {
        target: Arc<LogicalPlan>,
        input: Arc<LogicalPlan>,
        assignments: Vec<(ScalarExpr, ScalarExpr)>,
    },
    DeleteFrom {
        target: Arc<LogicalPlan>,
        input: Arc<LogicalPlan>,
    },
    Truncate {
        table: Arc<LogicalPlan>,
    },
    CreateTable {
        database: Option<String>,
        name: String,
        columns: Vec<ColumnDescriptor>,
        primary_key: Vec<String>,
        foreign_keys: Vec<ForeignKeyDef>,
        like: Option<Arc<LogicalPlan>>,
        select: Option<Arc<LogicalPlan>>,
    },
    AlterTable {
        table: Arc<LogicalPlan>,
        actions: Vec<AlterAction>,
    },
    ShowX {
        kind: String,
        filter: Option<ScalarExpr>,
    },
    Use {
        database: String,
    },
    StartTransaction {
        input: Arc<LogicalPlan>,
    },
    TransactionCommittingNode {
        input: Arc<LogicalPlan>,
    },
    RowUpdateAccumulator {
        input: Arc<LogicalPlan>,
    },
    ForeignKeyHandler {
        input: Arc<LogicalPlan>,
        references: Vec<ForeignKeyReferenceHandler>,
        cascades: Vec<ForeignKeyCascade>,
    },
    TriggerExecutor {
        input: Arc<LogicalPlan>,
        before: Vec<Arc<LogicalPlan>>,
        after: Vec<Arc<LogicalPlan>>,
    },
    ProcedureCall {
        name: String,
        args: Vec<ScalarExpr>,
    },
    Block {
        statements: Vec<Arc<LogicalPlan>>,
    },
    CreateTrigger {
        name: String,
        table: String,
        body: Arc<LogicalPlan>,
    },
    CreateProcedure {
        name: String,
        body: Arc<LogicalPlan>,
    },
    QueryProcess {
        input: Arc<LogicalPlan>,
    },
    /// Wraps a node with an analyzer-internal note without altering its
    /// semantics (e.g. marking an IN-subquery already attempted and failed
    /// to index, so later passes don't retry it).
    DecoratedNode {
        input: Arc<LogicalPlan>,
        note: String,
    },
    EmptyTable {
        schema: Schema,
    },
    Dual,
}

impl LogicalPlan {
    pub fn children(&self) -> Vec<Arc<LogicalPlan>> {
        use LogicalPlan::*;
        match self {
            UnresolvedTable { .. }
            | ResolvedTable { .. }
            | ShowX { .. }
            | Use { .. }
            | ProcedureCall { .. }
            | EmptyTable { .. }
            | Dual => vec![],
            IndexedTableAccess { table, .. } => vec![Arc::new((**table).clone())],
            TableAlias { input, .. }
            | SubqueryAlias { input, .. }
            | Project { input, .. }
            | Filter { input, .. }
            | GroupBy { input, .. }
            | Sort { input, .. }
            | Distinct { input }
            | OrderedDistinct { input }
            | Limit { input, .. }
            | Offset { input, .. }
            | TopN { input, .. }
            | StartTransaction { input }
            | TransactionCommittingNode { input }
            | RowUpdateAccumulator { input }
            | ForeignKeyHandler { input, .. }
            | TriggerExecutor { input, .. }
            | QueryProcess { input }
            | DecoratedNode { input, .. } => vec![input.clone()],
            CrossJoin { left, right }
            | NaturalJoin { left, right } => vec![left.clone(), right.clone()],
            InnerJoin { left, right, .. }
            | LeftJoin { left, right, .. }
            | RightJoin { left, right, .. } => vec![left.clone(), right.clone()],
            Union { inputs, .. } => inputs.clone(),
            Values { .. } => vec![],
            InsertInto { target, source, .. } => vec![target.clone(), source.clone()],
            Update { target, input, .. } => vec![target.clone(), input.clone()],
            DeleteFrom { target, input } => vec![target.clone(), input.clone()],
            Truncate { table } => vec![table.clone()],
            CreateTable { like, select, .. } => {
                let mut v = vec![];
                if let Some(l) = like {
                    v.push(l.clone());
                }
                if let Some(s) = select {
                    v.push(s.clone());
                }
                v
            }
            AlterTable { table, .. } => vec![table.clone()],
            Block { statements } => statements.clone(),
            CreateTrigger { body, .. } => vec![body.clone()],
            CreateProcedure { body, .. } => vec![body.clone()],
        }
    }

    pub fn with_children(&self, mut new_children: Vec<Arc<LogicalPlan>>) -> Result<LogicalPlan, PlanError> {
        use LogicalPlan::*;
        let expected = self.children().len();
        if new_children.len() != expected {
            return Err(PlanError::ArityMismatch {
                expected,
                given: new_children.len(),
            });
        }
        Ok(match self {
            UnresolvedTable { .. }
            | ResolvedTable { .. }
            | ShowX { .. }
            | Use { .. }
            | ProcedureCall { .. }
            | EmptyTable { .. }
            | Dual => self.clone(),
            IndexedTableAccess {
                index_id,
                ranges,
                schema,
                ..
            } => IndexedTableAccess {
                table: Box::new((*new_children.remove(0)).clone()),
                index_id: index_id.clone(),
                ranges: ranges.clone(),
                schema: schema.clone(),
            },
            TableAlias { alias, .. } => TableAlias {
                input: new_children.remove(0),
                alias: alias.clone(),
            },
            SubqueryAlias { alias, schema, .. } => SubqueryAlias {
                input: new_children.remove(0),
                alias: alias.clone(),
                schema: schema.clone(),
            },
            Project { items, schema, .. } => Project {
                input: new_children.remove(0),
                items: items.clone(),
                schema: schema.clone(),
            },
            Filter { predicate, .. } => Filter {
                input: new_children.remove(0),
                predicate: predicate.clone(),
            },
            GroupBy {
                group_exprs,
                aggregates,
                schema,
                ..
            } => GroupBy {
                input: new_children.remove(0),
                group_exprs: group_exprs.clone(),
                aggregates: aggregates.clone(),
                schema: schema.clone(),
            },
            Sort { order_by, .. } => Sort {
                input: new_children.remove(0),
                order_by: order_by.clone(),
            },
            Distinct { .. } => Distinct {
                input: new_children.remove(0),
            },
            OrderedDistinct { .. } => OrderedDistinct {
                input: new_children.remove(0),
            },
            Limit { limit, .. } => Limit {
                input: new_children.remove(0),
                limit: limit.clone(),
            },
            Offset { offset, .. } => Offset {
                input: new_children.remove(0),
                offset: offset.clone(),
            },
            TopN { order_by, limit, .. } => TopN {
                input: new_children.remove(0),
                order_by: order_by.clone(),
                limit: limit.clone(),
            },
            CrossJoin { .. } => CrossJoin {
                left: new_children.remove(0),
                right: new_children.remove(0),
            },
            NaturalJoin { .. } => NaturalJoin {
                left: new_children.remove(0),
                right: new_children.remove(0),
            },
            InnerJoin { on, kind, .. } => InnerJoin {
                left: new_children.remove(0),
                right: new_children.remove(0),
                on: on.clone(),
                kind: *kind,
            },
            LeftJoin { on, .. } => LeftJoin {
                left: new_children.remove(0),
                right: new_children.remove(0),
                on: on.clone(),
            },
            RightJoin { on, .. } => RightJoin {
                left: new_children.remove(0),
                right: new_children.remove(0),
                on: on.clone(),
            },
            Union {
                is_distinct, schema, ..
            } => Union {
                inputs: new_children,
                is_distinct: *is_distinct,
                schema: schema.clone(),
            },
            Values { .. } => self.clone(),
            InsertInto { columns, .. } => InsertInto {
                target: new_children.remove(0),
                source: new_children.remove(0),
                columns: columns.clone(),
            },
            Update { assignments, .. } => Update {
                target: new_children.remove(0),
                input: new_children.remove(0),
                assignments: assignments.clone(),
            },
            DeleteFrom { .. } => DeleteFrom {
                target: new_children.remove(0),
                input: new_children.remove(0),
            },
            Truncate { .. } => Truncate {
                table: new_children.remove(0),
            },
            CreateTable {
                database,
                name,
                columns,
                primary_key,
                foreign_keys,
                like,
                select,
            } => {
                let mut like_out = None;
                let mut select_out = None;
                if like.is_some() {
                    like_out = Some(new_children.remove(0));
                }
                if select.is_some() {
                    select_out = Some(new_children.remove(0));
                }
                CreateTable {
                    database: database.clone(),
                    name: name.clone(),
                    columns: columns.clone(),
                    primary_key: primary_key.clone(),
                    foreign_keys: foreign_keys.clone(),
                    like: like_out,
                    select: select_out,
                }
            }
            AlterTable { actions, .. } => AlterTable {
                table: new_children.remove(0),
                actions: actions.clone(),
            },
            StartTransaction { .. } => StartTransaction {
                input: new_children.remove(0),
            },
            TransactionCommittingNode { .. } => TransactionCommittingNode {
                input: new_children.remove(0),
            },
            RowUpdateAccumulator { .. } => RowUpdateAccumulator {
                input: new_children.remove(0),
            },
            ForeignKeyHandler {
                references,
                cascades,
                ..
            } => ForeignKeyHandler {
                input: new_children.remove(0),
                references: references.clone(),
                cascades: cascades.clone(),
            },
            TriggerExecutor { before, after, .. } => TriggerExecutor {
                input: new_children.remove(0),
                before: before.clone(),
                after: after.clone(),
            },
            Block { .. } => Block {
                statements: new_children,
            },
            CreateTrigger { name, table, .. } => CreateTrigger {
                name: name.clone(),
                table: table.clone(),
                body: new_children.remove(0),
            },
            CreateProcedure { name, .. } => CreateProcedure {
                name: name.clone(),
                body: new_children.remove(0),
            },
            QueryProcess { .. } => QueryProcess {
                input: new_children.remove(0),
            },
            DecoratedNode { note, .. } => DecoratedNode {
                input: new_children.remove(0),
                note: note.clone(),
            },
        })
    }

    /// Scalar expressions owned directly by this node (not by its
    /// children). Join `on` predicates and `Filter` predicates count;
    /// `GroupBy`'s `group_exprs`/`aggregates` and `Project`'s `items` are
    /// flattened into one vec in a stable order so `with_expressions` can
    /// split them back apart.
    pub fn expressions(&self) -> Vec<ScalarExpr> {
        use LogicalPlan::*;
        match self {
            Filter { predicate, .. } => vec![predicate.clone()],
            Project { items, .. } => items.clone(),
            GroupBy {
                group_exprs,
                aggregates,
                ..
            } => {
                let mut v = group_exprs.clone();
                v.extend(aggregates.clone());
                v
            }
            InnerJoin { on, .. } | LeftJoin { on, .. } | RightJoin { on, .. } => vec![on.clone()],
            Limit { limit, .. } => vec![limit.clone()],
            Offset { offset, .. } => vec![offset.clone()],
            TopN { limit, .. } => vec![limit.clone()],
            Values { rows, .. } => rows.iter().flatten().cloned().collect(),
            ShowX { filter: Some(f), .. } => vec![f.clone()],
            Update { assignments, .. } => assignments
                .iter()
                .flat_map(|(l, r)| vec![l.clone(), r.clone()])
                .collect(),
            ProcedureCall { args, .. } => args.clone(),
            IndexedTableAccess { ranges, .. } => ranges.clone(),
            _ => vec![],
        }
    }

    pub fn with_expressions(&self, mut new_exprs: Vec<ScalarExpr>) -> Result<LogicalPlan, PlanError> {
        use LogicalPlan::*;
        let expected = self.expressions().len();
        if new_exprs.len() != expected {
            return Err(PlanError::ExpressionArityMismatch {
                expected,
                given: new_exprs.len(),
            });
        }
        Ok(match self {
            Filter { input, .. } => Filter {
                input: input.clone(),
                predicate: new_exprs.into_iter().next().unwrap(),
            },
            Project { input, schema, .. } => Project {
                input: input.clone(),
                items: new_exprs,
                schema: schema.clone(),
            },
            GroupBy {
                input,
                group_exprs,
                schema,
                ..
            } => {
                let split = group_exprs.len();
                let aggregates = new_exprs.split_off(split.min(new_exprs.len()));
                GroupBy {
                    input: input.clone(),
                    group_exprs: new_exprs,
                    aggregates,
                    schema: schema.clone(),
                }
            }
            InnerJoin { left, right, kind, .. } => InnerJoin {
                left: left.clone(),
                right: right.clone(),
                on: new_exprs.into_iter().next().unwrap(),
                kind: *kind,
            },
            LeftJoin { left, right, .. } => LeftJoin {
                left: left.clone(),
                right: right.clone(),
                on: new_exprs.into_iter().next().unwrap(),
            },
            RightJoin { left, right, .. } => RightJoin {
                left: left.clone(),
                right: right.clone(),
                on: new_exprs.into_iter().next().unwrap(),
            },
            Limit { input, .. } => Limit {
                input: input.clone(),
                limit: new_exprs.into_iter().next().unwrap(),
            },
            Offset { input, .. } => Offset {
                input: input.clone(),
                offset: new_exprs.into_iter().next().unwrap(),
            },
            TopN { input, order_by, .. } => TopN {
                input: input.clone(),
                order_by: order_by.clone(),
                limit: new_exprs.into_iter().next().unwrap(),
            },
            Values { schema, rows } => {
                let width = rows.first().map(|r| r.len()).unwrap_or(0);
                let new_rows = if width == 0 {
                    vec![]
                } else {
                    new_exprs.chunks(width).map(|c| c.to_vec()).collect()
                };
                Values {
                    rows: new_rows,
                    schema: schema.clone(),
                }
            }
            ShowX { kind, .. } => ShowX {
                kind: kind.clone(),
                filter: new_exprs.into_iter().next(),
            },
            Update { target, input, .. } => {
                let assignments = new_exprs
                    .chunks(2)
                    .map(|c| (c[0].clone(), c[1].clone()))
                    .collect();
                Update {
                    target: target.clone(),
                    input: input.clone(),
                    assignments,
                }
            }
            ProcedureCall { name, .. } => ProcedureCall {
                name: name.clone(),
                args: new_exprs,
            },
            IndexedTableAccess {
                table,
                index_id,
                schema,
                ..
            } => IndexedTableAccess {
                table: table.clone(),
                index_id: index_id.clone(),
                ranges: new_exprs,
                schema: schema.clone(),
            },
            other => other.clone(),
        })
    }

    /// The node's own output schema, once resolved. Nodes that are purely
    /// structural (joins, filters, sorts, limits, ...) delegate to their
    /// primary input; `CrossJoin`/`InnerJoin`/etc. concatenate left/right in
    /// evaluation order, matching how GetField tie-breaks name collisions
    /// (spec.md §4.4 bullet 3).
    pub fn output_schema(&self) -> Schema {
        use LogicalPlan::*;
        match self {
            ResolvedTable { schema, .. }
            | IndexedTableAccess { schema, .. }
            | SubqueryAlias { schema, .. }
            | Project { schema, .. }
            | GroupBy { schema, .. }
            | Union { schema, .. }
            | Values { schema, .. }
            | EmptyTable { schema } => schema.clone(),
            TableAlias { input, alias } => {
                let mut schema = input.output_schema();
                for c in schema.0.iter_mut() {
                    c.source_table = Some(alias.clone());
                }
                schema
            }
            Filter { input, .. }
            | Sort { input, .. }
            | Distinct { input }
            | OrderedDistinct { input }
            | Limit { input, .. }
            | Offset { input, .. }
            | TopN { input, .. }
            | StartTransaction { input }
            | TransactionCommittingNode { input }
            | RowUpdateAccumulator { input }
            | ForeignKeyHandler { input, .. }
            | TriggerExecutor { input, .. }
            | QueryProcess { input }
            | DecoratedNode { input, .. } => input.output_schema(),
            CrossJoin { left, right } | NaturalJoin { left, right } => {
                let mut s = left.output_schema();
                s.extend(right.output_schema());
                s
            }
            InnerJoin { left, right, .. } | LeftJoin { left, right, .. } => {
                let mut s = left.output_schema();
                s.extend(right.output_schema());
                s
            }
            RightJoin { left, right, .. } => {
                let mut s = right.output_schema();
                s.extend(left.output_schema());
                s
            }
            InsertInto { .. } | Update { .. } | DeleteFrom { .. } | Truncate { .. } => Schema::empty(),
            Dual | UnresolvedTable { .. } | ShowX { .. } | Use { .. } | ProcedureCall { .. } => Schema::empty(),
            CreateTable { .. } | AlterTable { .. } | Block { .. } | CreateTrigger { .. } | CreateProcedure { .. } => {
                Schema::empty()
            }
        }
    }

    /// True once every node and expression in the subtree satisfies
    /// `resolved?` (spec.md §4.7 `validate_resolved`).
    pub fn is_resolved(&self) -> bool {
        if matches!(self, LogicalPlan::UnresolvedTable { .. }) {
            return false;
        }
        self.expressions().iter().all(ScalarExpr::is_resolved)
            && self.children().iter().all(|c| c.is_resolved())
    }
}
