//! INSERT / UPDATE / DELETE / SELECT conversion.

use super::table_ref;
use crate::model::{
    ColumnRef, Delete, Insert, ParsedStatement, Predicate, Select, SqlKind, StatementBody,
    TableRef, Update,
};
use sqlparser::ast::{
    self, Assignment, AssignmentTarget, BinaryOperator, Expr, FromTable, GroupByExpr,
    JoinConstraint, JoinOperator, ObjectName, Query, SelectItem, SetExpr, TableFactor,
    TableWithJoins, UnaryOperator, visit_expressions,
};
use std::ops::ControlFlow;

pub(super) fn insert(insert: &ast::Insert) -> (SqlKind, StatementBody) {
    let mut row_lengths = Vec::new();
    let mut select = None;

    if let Some(source) = &insert.source {
        match source.body.as_ref() {
            SetExpr::Values(values) => {
                row_lengths = values.rows.iter().map(Vec::len).collect();
            }
            _ => select = Some(Box::new(self::select(source))),
        }
    }

    let kind = match (insert.replace_into, select.is_some()) {
        (false, false) => SqlKind::Insert,
        (false, true) => SqlKind::InsertSelect,
        (true, false) => SqlKind::Replace,
        (true, true) => SqlKind::ReplaceSelect,
    };

    (
        kind,
        StatementBody::Insert(Insert {
            table: table_ref(&insert.table_name),
            columns: insert.columns.iter().map(|c| c.value.clone()).collect(),
            row_lengths,
            select,
            replace: insert.replace_into,
        }),
    )
}

pub(super) fn update(
    table: &TableWithJoins,
    assignments: &[Assignment],
    selection: Option<&Expr>,
) -> Update {
    let mut tables = Vec::new();
    let mut join_columns = Vec::new();
    collect_tables(table, &mut tables, &mut join_columns);

    let assignments = assignments
        .iter()
        .flat_map(|a| match &a.target {
            AssignmentTarget::ColumnName(name) => vec![column_ref(name)],
            AssignmentTarget::Tuple(names) => names.iter().map(column_ref).collect(),
        })
        .collect();

    Update {
        tables,
        assignments,
        predicate: selection.map(predicate),
        has_limit: false,
        has_order_by: false,
    }
}

pub(super) fn delete(delete: &ast::Delete) -> Delete {
    let mut tables: Vec<TableRef> = delete.tables.iter().map(table_ref).collect();
    let mut from_tables = Vec::new();
    let mut join_columns = Vec::new();
    let from = match &delete.from {
        FromTable::WithFromKeyword(from) | FromTable::WithoutKeyword(from) => from,
    };
    for table in from {
        collect_tables(table, &mut from_tables, &mut join_columns);
    }
    if tables.is_empty() {
        tables = from_tables;
    } else {
        // Multi-table DELETE names aliases first; resolve them against FROM.
        for named in &mut tables {
            if let Some(real) = from_tables
                .iter()
                .find(|t| named.db.is_none() && t.answers_to(&named.name))
            {
                *named = real.clone();
            }
        }
    }

    Delete {
        tables,
        predicate: delete.selection.as_ref().map(predicate),
        has_limit: delete.limit.is_some(),
        has_order_by: !delete.order_by.is_empty(),
    }
}

pub(super) fn select(query: &Query) -> Select {
    let mut out = Select {
        has_limit: query.limit.is_some(),
        ..Select::default()
    };

    if let Some(order_by) = &query.order_by {
        for item in &order_by.exprs {
            if item.expr.to_string().to_ascii_uppercase().starts_with("RAND(") {
                out.order_by_rand = true;
            }
            collect_columns(&item.expr, &mut out.order_by);
        }
    }

    let body = match query.body.as_ref() {
        SetExpr::Select(body) => body,
        SetExpr::Query(inner) => return merge_outer(select(inner), out),
        _ => return out,
    };

    for item in &body.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                collect_columns(expr, &mut out.columns)
            }
            // `*` and `t.*`
            _ => out.star = true,
        }
    }
    for table in &body.from {
        collect_tables(table, &mut out.tables, &mut out.join_columns);
    }
    out.predicate = body.selection.as_ref().map(predicate);
    if let GroupByExpr::Expressions(exprs, _) = &body.group_by {
        for expr in exprs {
            collect_columns(expr, &mut out.group_by);
        }
    }
    out
}

fn merge_outer(mut inner: Select, outer: Select) -> Select {
    inner.order_by.extend(outer.order_by);
    inner.order_by_rand |= outer.order_by_rand;
    inner.has_limit |= outer.has_limit;
    inner
}

fn collect_tables(table: &TableWithJoins, tables: &mut Vec<TableRef>, join_columns: &mut Vec<ColumnRef>) {
    push_factor(&table.relation, tables);
    for join in &table.joins {
        push_factor(&join.relation, tables);
        let constraint = match &join.join_operator {
            JoinOperator::Inner(c)
            | JoinOperator::LeftOuter(c)
            | JoinOperator::RightOuter(c)
            | JoinOperator::FullOuter(c) => Some(c),
            _ => None,
        };
        if let Some(JoinConstraint::On(expr)) = constraint {
            collect_columns(expr, join_columns);
        }
    }
}

fn push_factor(factor: &TableFactor, tables: &mut Vec<TableRef>) {
    if let TableFactor::Table { name, alias, .. } = factor {
        let mut table = table_ref(name);
        table.alias = alias.as_ref().map(|a| a.name.value.clone());
        tables.push(table);
    }
}

fn column_ref(name: &ObjectName) -> ColumnRef {
    let idents = &name.0;
    match idents.as_slice() {
        [.., qualifier, column] => ColumnRef::new(Some(qualifier.value.as_str()), &column.value),
        [column] => ColumnRef::new(None, &column.value),
        [] => ColumnRef::new(None, ""),
    }
}

/// Every column referenced in `expr`, subqueries included.
fn collect_columns(expr: &Expr, out: &mut Vec<ColumnRef>) {
    let _ = visit_expressions(expr, |e| {
        match e {
            Expr::Identifier(ident) => out.push(ColumnRef::new(None, &ident.value)),
            Expr::CompoundIdentifier(idents) => match idents.as_slice() {
                [.., qualifier, column] => {
                    out.push(ColumnRef::new(Some(qualifier.value.as_str()), &column.value))
                }
                [column] => out.push(ColumnRef::new(None, &column.value)),
                [] => {}
            },
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });
}

fn columns_of(expr: &Expr) -> Vec<ColumnRef> {
    let mut out = Vec::new();
    collect_columns(expr, &mut out);
    out
}

pub(super) fn predicate(expr: &Expr) -> Predicate {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Predicate::And(flatten(predicate(left), predicate(right), true)),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Predicate::Or(flatten(predicate(left), predicate(right), false)),
        Expr::BinaryOp { left, op, right } => {
            let mut columns = columns_of(left);
            columns.extend(columns_of(right));
            Predicate::Compare {
                columns,
                op: op.to_string(),
            }
        }
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Predicate::Not(Box::new(predicate(expr))),
        Expr::Nested(inner) => predicate(inner),
        Expr::InList {
            expr,
            list,
            negated,
        } => Predicate::InList {
            column: columns_of(expr).into_iter().next(),
            len: list.len(),
            negated: *negated,
        },
        other => Predicate::Other {
            columns: columns_of(other),
        },
    }
}

fn flatten(left: Predicate, right: Predicate, and: bool) -> Vec<Predicate> {
    let mut items = Vec::new();
    for side in [left, right] {
        match side {
            Predicate::And(inner) if and => items.extend(inner),
            Predicate::Or(inner) if !and => items.extend(inner),
            other => items.push(other),
        }
    }
    items
}

/// UPDATE/DELETE whose trailing ORDER BY / LIMIT was cut before parsing.
pub(super) fn with_trailing_clauses(mut parsed: ParsedStatement, order_by: bool, limit: bool) -> ParsedStatement {
    match &mut parsed.body {
        StatementBody::Update(update) => {
            update.has_order_by |= order_by;
            update.has_limit |= limit;
        }
        StatementBody::Delete(delete) => {
            delete.has_order_by |= order_by;
            delete.has_limit |= limit;
        }
        _ => {}
    }
    parsed
}
