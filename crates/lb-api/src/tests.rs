use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;

use super::*;

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("luabridge-rs-{}-{}", name, nanos))
}

fn sample_table() -> Table {
    Table::sequence(["one", "two"])
        .with(0.5, "half")
        .with(true, Table::new().with("deep", false))
        .with("asdf", "val")
}

#[test]
fn transfer_copies_tables_and_scalars() {
    let source = Interpreter::new();
    source
        .run("config = { 'one', 'two', nested = { flag = true } }; count = 3")
        .expect("seed");
    let mut target = Interpreter::new();

    assert_eq!(transfer_value(&source, &mut target, "config"), Ok(true));
    assert_eq!(transfer_value(&source, &mut target, "count"), Ok(true));
    assert_eq!(target.read_table("config"), source.read_table("config"));
    assert_eq!(target.read_number("count"), Some(3.0));
}

#[test]
fn transfer_of_a_missing_path_leaves_the_target_alone() {
    let source = Interpreter::new();
    let mut target = Interpreter::new();
    target.write_value("kept", "yes").expect("write");

    assert_eq!(transfer_value(&source, &mut target, "kept"), Ok(false));
    assert_eq!(target.read_string("kept"), Some("yes".to_string()));
}

#[test]
fn transfer_reports_cyclic_tables() {
    let source = Interpreter::new();
    source.run("loop = {}; loop.next = loop").expect("seed");
    let mut target = Interpreter::new();

    let error = transfer_value(&source, &mut target, "loop").expect_err("cycle");
    assert_eq!(error.code, "MARSHAL_TABLE_CYCLE");
    assert_eq!(target.read_table("loop"), None);
}

#[test]
fn snapshot_file_round_trips_a_table() {
    let path = temp_path("round-trip").join("snapshot.json");
    let table = sample_table();

    save_table_snapshot(&path, &table).expect("save");
    assert_eq!(load_table_snapshot(&path), Ok(table));

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn loading_a_missing_snapshot_fails() {
    let error = load_table_snapshot(&temp_path("missing")).expect_err("missing");
    assert_eq!(error.code, "SNAPSHOT_IO");
}

#[test]
fn loading_rejects_malformed_and_foreign_documents() {
    let malformed = temp_path("malformed");
    fs::write(&malformed, "{ not json").expect("write");
    assert_eq!(
        load_table_snapshot(&malformed).expect_err("malformed").code,
        "SNAPSHOT_INVALID"
    );

    let foreign = temp_path("foreign");
    fs::write(&foreign, r#"{"schema_version":"table-snapshot.v0","table":[]}"#).expect("write");
    assert_eq!(
        load_table_snapshot(&foreign).expect_err("schema").code,
        "SNAPSHOT_SCHEMA"
    );

    fs::remove_file(malformed).expect("cleanup");
    fs::remove_file(foreign).expect("cleanup");
}

#[test]
fn transfer_skips_strings_that_are_not_utf8() {
    let source = Interpreter::new();
    source.run(r#"s = "\xff\xfe""#).expect("seed");
    let mut target = Interpreter::new();

    assert_eq!(transfer_value(&source, &mut target, "s"), Ok(false));
    target.run("assert(s == nil)").expect("nothing was written");
}
