//! Subcommand implementations for the `sqlward` binary.

pub mod check;
pub mod encrypt;
pub mod serve;
pub mod sqltypes;

use sqlward_session::ResultTable;

/// Print a result table one record per block, like the MySQL client's `\G`.
///
/// Audit messages span several lines, which a grid layout cannot show.
pub fn render_vertical(table: &ResultTable) -> String {
    let width = table.columns.iter().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (index, row) in table.rows.iter().enumerate() {
        out.push_str(&format!("{:*^60}\n", format!(" {}. row ", index + 1)));
        for (column, value) in table.columns.iter().zip(row) {
            let mut lines = value.lines();
            let first = lines.next().unwrap_or("");
            out.push_str(&format!("{column:>width$}: {first}\n"));
            for line in lines {
                out.push_str(&format!("{:>width$}  {line}\n", ""));
            }
        }
    }
    out.push_str(&format!("{} rows in set\n", table.rows.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_vertical_indents_continuation_lines() {
        let mut table = ResultTable::new(&["id", "err_message"]);
        table.push_row(vec!["1".to_string(), "first\nsecond".to_string()]);

        let rendered = render_vertical(&table);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].contains(" 1. row "));
        assert_eq!(lines[1], "         id: 1");
        assert_eq!(lines[2], "err_message: first");
        assert_eq!(lines[3], "             second");
        assert_eq!(lines[4], "1 rows in set");
    }
}
