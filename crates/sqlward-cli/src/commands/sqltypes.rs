//! `sqlward sqltypes` - list statement types and whether they are audited.

use super::render_vertical;
use sqlward_rules::sql_types;
use sqlward_session::ResultTable;

pub fn run() {
    print!("{}", render_vertical(&ResultTable::sql_types(&sql_types())));
}
