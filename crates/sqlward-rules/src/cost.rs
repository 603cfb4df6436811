//! Cost prediction for ALTER TABLE.

use sqlward_core::{CostTier, DbVersion};
use sqlward_sql::{AlterOp, AlterTable};

/// Cost tier of one sub-operation.
pub fn op_cost(op: &AlterOp, version: DbVersion) -> CostTier {
    match op {
        AlterOp::AddColumn(_) if version >= DbVersion::new(8, 0) => CostTier::Instant,
        AlterOp::AddColumn(_) => CostTier::Inplace,
        AlterOp::DropColumn(_) => CostTier::Inplace,
        AlterOp::ModifyColumn { .. } => CostTier::Copy,
        AlterOp::ChangeDefault(_) => CostTier::Instant,
        AlterOp::ColumnOrder(_) => CostTier::Inplace,
        AlterOp::AddIndex(_) | AlterOp::DropIndex(_) | AlterOp::RenameIndex { .. } => {
            CostTier::Inplace
        }
        AlterOp::RenameTable(_) => CostTier::Instant,
        AlterOp::Options { engine: Some(_) } => CostTier::Copy,
        AlterOp::Options { engine: None } => CostTier::Instant,
        AlterOp::AddPartition | AlterOp::DropPartition => CostTier::Copy,
        AlterOp::Other(_) => CostTier::Inplace,
    }
}

/// Worst tier across all sub-operations. An ALTER without operations is
/// treated as metadata-only.
pub fn predict_cost(alter: &AlterTable, version: DbVersion) -> CostTier {
    alter
        .ops
        .iter()
        .map(|op| op_cost(op, version))
        .max()
        .unwrap_or(CostTier::Instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlward_sql::{ColumnDef, TableRef};

    fn alter(ops: Vec<AlterOp>) -> AlterTable {
        AlterTable {
            table: TableRef::new(None, "t"),
            ops,
        }
    }

    #[test]
    fn test_add_column_depends_on_version() {
        let add = alter(vec![AlterOp::AddColumn(ColumnDef::new("c", "INT"))]);
        assert_eq!(predict_cost(&add, DbVersion::new(8, 0)), CostTier::Instant);
        assert_eq!(predict_cost(&add, DbVersion::new(5, 7)), CostTier::Inplace);
    }

    #[test]
    fn test_worst_tier_wins() {
        let mixed = alter(vec![
            AlterOp::AddColumn(ColumnDef::new("c", "INT")),
            AlterOp::ModifyColumn {
                old_name: "d".into(),
                column: ColumnDef::new("d", "BIGINT"),
            },
        ]);
        assert_eq!(predict_cost(&mixed, DbVersion::new(8, 0)), CostTier::Copy);

        let index = alter(vec![AlterOp::DropIndex("idx_a".into())]);
        assert_eq!(predict_cost(&index, DbVersion::default()), CostTier::Inplace);
    }

    #[test]
    fn test_engine_change_copies() {
        let engine = alter(vec![AlterOp::Options {
            engine: Some("InnoDB".into()),
        }]);
        assert_eq!(predict_cost(&engine, DbVersion::default()), CostTier::Copy);
    }
}
