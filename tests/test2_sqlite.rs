#![cfg(feature = "sqlite")]
use chrono::NaiveDateTime;
use serde::Deserialize;
use sql_resilient::prelude::*;

fn sqlite_conn(path: &str) -> Connection<SqliteTransport> {
    let options = ConnectionOptionsBuilder::new("sqlite", BackendKind::Sqlite).finish();
    Connection::new(SqliteTransport::new(path), options)
}

#[derive(Debug, Deserialize, PartialEq)]
struct Player {
    id: i64,
    name: String,
    score: Option<f64>,
}

#[test]
fn sqlite_read_write_other() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = sqlite_conn(":memory:");

    let created = conn.execute(&QueryRequest::other(
        "CREATE TABLE player (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)",
    ))?;
    assert_eq!(created.affected_rows(), Some(0));

    let inserted = conn.execute(&QueryRequest::write(
        "INSERT INTO player (id, name, score) VALUES (1, 'ann', 9.5), (2, 'bob', NULL)",
    ))?;
    assert!(matches!(
        inserted,
        QueryOutcome::Write {
            insert_id: -1,
            affected_rows: 2
        }
    ));

    let updated =
        conn.execute(&QueryRequest::other("UPDATE player SET score = 1.0 WHERE id = 2"))?;
    assert_eq!(updated.affected_rows(), Some(1));

    let outcome =
        conn.execute(&QueryRequest::read("SELECT id, name, score FROM player ORDER BY id"))?;
    let QueryOutcome::Read { rows, row_count_hint } = outcome else {
        panic!("expected a read outcome");
    };
    assert_eq!(row_count_hint, 2);
    let names: Vec<_> = rows
        .iter()
        .filter_map(Record::as_row)
        .map(|row| row.get("name").and_then(RowValues::as_text).map(str::to_string))
        .collect();
    assert_eq!(names, vec![Some("ann".to_string()), Some("bob".to_string())]);
    assert_eq!(conn.last_query(), Some("SELECT id, name, score FROM player ORDER BY id"));
    Ok(())
}

#[test]
fn sqlite_typed_and_generic_hydration() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = sqlite_conn(":memory:");
    conn.execute(&QueryRequest::other(
        "CREATE TABLE player (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)",
    ))?;
    conn.execute(&QueryRequest::write(
        "INSERT INTO player VALUES (1, 'ann', 9.5), (2, 'bob', NULL)",
    ))?;

    let request = QueryRequest::read_as::<Player>("SELECT id, name, score FROM player ORDER BY id");
    let typed = conn
        .execute(&request)?
        .into_read()
        .ok_or("expected rows")?;
    let players: Vec<Player> = typed.typed_rows()?;
    assert_eq!(
        players,
        vec![
            Player {
                id: 1,
                name: "ann".into(),
                score: Some(9.5)
            },
            Player {
                id: 2,
                name: "bob".into(),
                score: None
            },
        ]
    );

    let generic = conn.query(
        QueryType::Read,
        "SELECT name FROM player WHERE id = 2",
        Hydration::AsGenericRecord,
    )?;
    let record = generic.as_read().and_then(|r| r.get(0)).ok_or("expected a row")?;
    assert_eq!(record.field("name"), Some(serde_json::json!("bob")));
    Ok(())
}

#[test]
fn sqlite_declared_types_hydrate() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = sqlite_conn(":memory:");
    conn.execute(&QueryRequest::other(
        "CREATE TABLE event (id INTEGER, at DATETIME, done BOOLEAN, meta JSON)",
    ))?;
    conn.execute(&QueryRequest::write(
        r#"INSERT INTO event VALUES (1, '2024-01-03 10:30:00', 0, '{"tags": ["a"]}')"#,
    ))?;

    let rows = conn
        .execute(&QueryRequest::read("SELECT id, at, done, meta FROM event"))?
        .into_read()
        .ok_or("expected rows")?;
    let row = rows.get(0).and_then(Record::as_row).ok_or("expected an array row")?;
    let at = NaiveDateTime::parse_from_str("2024-01-03 10:30:00", "%Y-%m-%d %H:%M:%S")?;
    assert_eq!(row.get("at"), Some(&RowValues::Timestamp(at)));
    assert_eq!(row.get("done"), Some(&RowValues::Bool(false)));

    let maps = rows.as_array();
    assert_eq!(maps[0].get("at"), Some(&serde_json::json!("2024-01-03 10:30:00")));
    assert_eq!(maps[0].get("done"), Some(&serde_json::json!(false)));
    assert_eq!(maps[0].get("meta"), Some(&serde_json::json!({"tags": ["a"]})));
    Ok(())
}

#[test]
fn sqlite_errors_are_terminal_and_carry_sql() {
    let mut conn = sqlite_conn(":memory:");

    let err = conn
        .execute(&QueryRequest::read("SELECT * FROM no_such_table"))
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Terminal);
    assert_eq!(err.code, 1);
    assert!(err.message.contains("no such table"));
    assert!(err.message.ends_with("with query: \"SELECT * FROM no_such_table\""));
}

#[test]
fn sqlite_constraint_violation_is_not_retried() {
    let mut conn = sqlite_conn(":memory:");
    conn.execute(&QueryRequest::other("CREATE TABLE t (id INTEGER PRIMARY KEY)")).unwrap();
    conn.execute(&QueryRequest::write("INSERT INTO t VALUES (1)")).unwrap();

    let err = conn.execute(&QueryRequest::write("INSERT INTO t VALUES (1)")).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Terminal);
    // primary result code SQLITE_CONSTRAINT, whatever the extended code
    assert_eq!(err.code & 0xff, 19);
    assert_eq!(conn.last_query(), Some("INSERT INTO t VALUES (1)"));
}

#[test]
fn sqlite_file_survives_reconnect() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("resilient.db");
    let path = path.to_str().ok_or("non-utf8 temp path")?;

    let mut conn = sqlite_conn(path);
    conn.execute(&QueryRequest::other("CREATE TABLE t (id INTEGER)"))?;
    conn.execute(&QueryRequest::write("INSERT INTO t VALUES (7)"))?;
    conn.disconnect();
    assert!(!conn.is_connected());

    let rows = conn
        .execute(&QueryRequest::read("SELECT id FROM t"))?
        .into_read()
        .ok_or("expected rows")?;
    assert_eq!(rows.get(0).and_then(|r| r.field("id")), Some(serde_json::json!(7)));
    Ok(())
}
