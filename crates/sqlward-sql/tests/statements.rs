//! End-to-end checks over a realistic migration script.

use pretty_assertions::assert_eq;
use sqlward_sql::{
    AlterOp, MySqlParser, SqlKind, StatementBody, StatementParser, fingerprint, query_tree,
    split_statements,
};

const SCRIPT: &str = "/*--user=root;--password=x;--host=127.0.0.1;--port=3306;--enable-check=1;*/
inception_magic_start;
USE shop;
CREATE TABLE orders (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT COMMENT 'id',
    note VARCHAR(255) NOT NULL DEFAULT '' COMMENT 'note; may contain semicolons',
    PRIMARY KEY (id),
    KEY idx_note (note(20))
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COMMENT='orders';
ALTER TABLE orders ADD COLUMN total DECIMAL(10,2) NOT NULL DEFAULT 0 COMMENT 'total';
UPDATE orders SET total = 1 WHERE id IN (1, 2) LIMIT 10;
inception_magic_commit;";

#[test]
fn test_script_splits_and_parses() {
    let pieces = split_statements(SCRIPT);
    assert_eq!(pieces.len(), 6);
    assert!(pieces[0].ends_with("inception_magic_start"));
    assert_eq!(pieces[5], "inception_magic_commit");

    let parser = MySqlParser::new();
    let kinds: Vec<SqlKind> = pieces[1..5]
        .iter()
        .map(|sql| parser.parse(sql).unwrap().kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            SqlKind::UseDatabase,
            SqlKind::CreateTable,
            SqlKind::AlterTable,
            SqlKind::Update,
        ]
    );
}

#[test]
fn test_prefixed_index_survives_parsing() {
    let pieces = split_statements(SCRIPT);
    let parsed = MySqlParser::new().parse(&pieces[2]).unwrap();
    let StatementBody::CreateTable(create) = parsed.body else {
        panic!("expected CREATE TABLE");
    };
    let index = create
        .indexes
        .iter()
        .find(|i| i.name.as_deref() == Some("idx_note"))
        .unwrap();
    assert_eq!(index.parts[0].prefix, Some(20));
    assert_eq!(create.comment.as_deref(), Some("orders"));
}

#[test]
fn test_alter_sub_type_and_tree() {
    let parsed = MySqlParser::new()
        .parse("ALTER TABLE orders ADD COLUMN a INT, MODIFY COLUMN note VARCHAR(10)")
        .unwrap();
    let StatementBody::AlterTable(alter) = &parsed.body else {
        panic!("expected ALTER");
    };
    assert!(matches!(alter.ops[0], AlterOp::AddColumn(_)));
    assert_eq!(alter.sub_type(), "ADD_COLUMN,MODIFY_COLUMN");

    let tree = query_tree(&parsed, "shop");
    assert_eq!(tree["tables"][0]["db"], "shop");
}

#[test]
fn test_fingerprint_equivalence() {
    assert_eq!(
        fingerprint("SELECT * FROM t WHERE id=1"),
        fingerprint("SELECT * FROM t WHERE id=2")
    );
    assert_ne!(
        fingerprint("SELECT * FROM t WHERE id=1"),
        fingerprint("SELECT name FROM t WHERE id=1")
    );
}
