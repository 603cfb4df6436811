//! CREATE TABLE / ALTER TABLE / CREATE INDEX conversion.

use super::{table_ref, unquote};
use crate::model::{
    AlterOp, AlterTable, ColumnDef, CreateTable, IndexDef, IndexKind, IndexPart, TableRef,
};
use sqlparser::ast::{
    self, AlterColumnOperation, AlterTableOperation, ColumnOption, CommentDef, Expr, Ident,
    ObjectName, TableConstraint,
};

pub(super) fn create_table(create: &ast::CreateTable) -> CreateTable {
    let columns: Vec<ColumnDef> = create.columns.iter().map(column_def).collect();

    let mut indexes: Vec<IndexDef> = create.constraints.iter().filter_map(constraint).collect();
    for column in &columns {
        if column.primary_key && !indexes.iter().any(|i| i.kind == IndexKind::Primary) {
            indexes.push(IndexDef {
                name: Some("PRIMARY".to_string()),
                kind: IndexKind::Primary,
                parts: vec![IndexPart::new(&column.name)],
            });
        }
        if column.unique {
            indexes.push(IndexDef {
                name: Some(column.name.clone()),
                kind: IndexKind::Unique,
                parts: vec![IndexPart::new(&column.name)],
            });
        }
    }

    CreateTable {
        table: table_ref(&create.name),
        columns,
        indexes,
        engine: create.engine.as_ref().map(|e| e.name.clone()),
        charset: create.default_charset.clone(),
        comment: create.comment.as_ref().map(|c| match c {
            CommentDef::WithEq(text)
            | CommentDef::WithoutEq(text)
            | CommentDef::AfterColumnDefsWithoutEq(text) => text.clone(),
        }),
        auto_increment: create.auto_increment_offset.map(u64::from),
        partitioned: create.partition_by.is_some(),
        from_select: create.query.is_some(),
        like: create.like.as_ref().map(table_ref),
        if_not_exists: create.if_not_exists,
    }
}

pub(super) fn column_def(column: &ast::ColumnDef) -> ColumnDef {
    let mut def = ColumnDef::new(&column.name.value, &column.data_type.to_string());
    for option in &column.options {
        apply_column_option(&mut def, &option.option);
    }
    def
}

fn apply_column_option(def: &mut ColumnDef, option: &ColumnOption) {
    match option {
        ColumnOption::Null => def.nullable = Some(true),
        ColumnOption::NotNull => def.nullable = Some(false),
        ColumnOption::Default(expr) => {
            def.default_now = is_now(expr);
            def.default = Some(expr.to_string());
        }
        ColumnOption::OnUpdate(expr) => def.on_update_now = is_now(expr),
        ColumnOption::Unique { is_primary, .. } => {
            if *is_primary {
                def.primary_key = true;
            } else {
                def.unique = true;
            }
        }
        ColumnOption::Comment(text) => def.comment = Some(text.clone()),
        ColumnOption::CharacterSet(name) => def.charset = Some(name.to_string()),
        ColumnOption::Generated { .. } => def.generated = true,
        ColumnOption::DialectSpecific(tokens) => {
            if tokens
                .iter()
                .any(|t| t.to_string().eq_ignore_ascii_case("AUTO_INCREMENT"))
            {
                def.auto_increment = true;
            }
        }
        _ => {}
    }
}

fn is_now(expr: &Expr) -> bool {
    let rendered = expr.to_string().to_ascii_uppercase();
    ["CURRENT_TIMESTAMP", "NOW(", "LOCALTIMESTAMP", "LOCALTIME"]
        .iter()
        .any(|prefix| rendered.starts_with(prefix))
}

fn parts(columns: &[Ident]) -> Vec<IndexPart> {
    columns.iter().map(|c| IndexPart::new(&c.value)).collect()
}

pub(super) fn constraint(constraint: &TableConstraint) -> Option<IndexDef> {
    let (name, kind, columns) = match constraint {
        TableConstraint::PrimaryKey { columns, .. } => {
            (Some("PRIMARY".to_string()), IndexKind::Primary, columns)
        }
        TableConstraint::Unique {
            name,
            index_name,
            columns,
            ..
        } => (
            index_name.as_ref().or(name.as_ref()).map(|i| i.value.clone()),
            IndexKind::Unique,
            columns,
        ),
        TableConstraint::Index { name, columns, .. } => {
            (name.as_ref().map(|i| i.value.clone()), IndexKind::Normal, columns)
        }
        TableConstraint::FulltextOrSpatial {
            fulltext,
            opt_index_name,
            columns,
            ..
        } => (
            opt_index_name.as_ref().map(|i| i.value.clone()),
            if *fulltext {
                IndexKind::Fulltext
            } else {
                IndexKind::Normal
            },
            columns,
        ),
        TableConstraint::ForeignKey { name, columns, .. } => {
            (name.as_ref().map(|i| i.value.clone()), IndexKind::Foreign, columns)
        }
        _ => return None,
    };
    Some(IndexDef {
        name,
        kind,
        parts: parts(columns),
    })
}

pub(super) fn alter_table(name: &ObjectName, operations: &[AlterTableOperation]) -> AlterTable {
    let mut ops = Vec::new();
    for operation in operations {
        alter_operation(operation, &mut ops);
    }
    AlterTable {
        table: table_ref(name),
        ops,
    }
}

fn modified_column(
    old_name: &Ident,
    new_name: &Ident,
    data_type: &ast::DataType,
    options: &[ColumnOption],
    reordered: bool,
    ops: &mut Vec<AlterOp>,
) {
    let mut column = ColumnDef::new(&new_name.value, &data_type.to_string());
    for option in options {
        apply_column_option(&mut column, option);
    }
    ops.push(AlterOp::ModifyColumn {
        old_name: old_name.value.clone(),
        column,
    });
    if reordered {
        ops.push(AlterOp::ColumnOrder(new_name.value.clone()));
    }
}

fn alter_operation(operation: &AlterTableOperation, ops: &mut Vec<AlterOp>) {
    match operation {
        AlterTableOperation::AddColumn { column_def: def, .. } => {
            ops.push(AlterOp::AddColumn(column_def(def)))
        }
        AlterTableOperation::DropColumn { column_name, .. } => {
            ops.push(AlterOp::DropColumn(column_name.value.clone()))
        }
        AlterTableOperation::ModifyColumn {
            col_name,
            data_type,
            options,
            column_position,
            ..
        } => modified_column(
            col_name,
            col_name,
            data_type,
            options,
            column_position.is_some(),
            ops,
        ),
        AlterTableOperation::ChangeColumn {
            old_name,
            new_name,
            data_type,
            options,
            column_position,
            ..
        } => modified_column(
            old_name,
            new_name,
            data_type,
            options,
            column_position.is_some(),
            ops,
        ),
        AlterTableOperation::AlterColumn { column_name, op, .. } => match op {
            AlterColumnOperation::SetDefault { .. } | AlterColumnOperation::DropDefault => {
                ops.push(AlterOp::ChangeDefault(column_name.value.clone()))
            }
            AlterColumnOperation::SetDataType { data_type, .. } => ops.push(AlterOp::ModifyColumn {
                old_name: column_name.value.clone(),
                column: ColumnDef::new(&column_name.value, &data_type.to_string()),
            }),
            other => ops.push(AlterOp::Other(other.to_string())),
        },
        AlterTableOperation::AddConstraint(added) => match constraint(added) {
            Some(index) => ops.push(AlterOp::AddIndex(index)),
            None => ops.push(AlterOp::Other(added.to_string())),
        },
        AlterTableOperation::DropConstraint { name, .. } => {
            ops.push(AlterOp::DropIndex(name.value.clone()))
        }
        AlterTableOperation::DropPrimaryKey => ops.push(AlterOp::DropIndex("PRIMARY".to_string())),
        AlterTableOperation::RenameTable { table_name, .. } => {
            ops.push(AlterOp::RenameTable(table_ref(table_name)))
        }
        AlterTableOperation::AddPartitions { .. } => ops.push(AlterOp::AddPartition),
        AlterTableOperation::DropPartitions { .. } => ops.push(AlterOp::DropPartition),
        other => ops.push(AlterOp::Other(other.to_string())),
    }
}

pub(super) fn create_index(index: &ast::CreateIndex) -> AlterTable {
    let parts = index
        .columns
        .iter()
        .map(|c| IndexPart::new(unquote(&c.expr.to_string())))
        .collect();
    AlterTable {
        table: table_ref(&index.table_name),
        ops: vec![AlterOp::AddIndex(IndexDef {
            name: index.name.as_ref().map(super::last_ident),
            kind: if index.unique {
                IndexKind::Unique
            } else {
                IndexKind::Normal
            },
            parts,
        })],
    }
}

/// Single-operation ALTER, the shape CREATE/DROP INDEX and RENAME TABLE take.
pub(super) fn single_op(table: TableRef, op: AlterOp) -> AlterTable {
    AlterTable {
        table,
        ops: vec![op],
    }
}
