//! End-to-end export tests against mock sessions.

use super::common::{
    assert_sheet_matches, read_sheet, write_config, write_properties_config, DbSettings,
};
use calamine::Data;
use chrono::NaiveDate;
use pgxport::db::{MockConnector, TabularResult, Value};
use pgxport::error::{ConnectFailure, ExportError};
use pgxport::pipeline::{exit_code, Pipeline, Stage};
use pgxport::status::Console;
use pretty_assertions::assert_eq;

fn people() -> TabularResult {
    TabularResult::new(
        vec!["id".into(), "name".into()],
        vec![
            vec![Value::from(1), Value::from("a")],
            vec![Value::from(2), Value::from("b")],
        ],
    )
    .unwrap()
}

fn mixed() -> TabularResult {
    let day = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    TabularResult::new(
        vec![
            "id".into(),
            "price".into(),
            "in_stock".into(),
            "label".into(),
            "updated_at".into(),
            "released".into(),
        ],
        vec![
            vec![
                Value::from(10),
                Value::from(19.25),
                Value::Bool(true),
                Value::from("Widget ünïcode"),
                Value::Timestamp(day.and_hms_opt(18, 0, 0).unwrap()),
                Value::Timestamp(day.and_hms_opt(0, 0, 0).unwrap()),
            ],
            vec![
                Value::from(11),
                Value::Null,
                Value::Bool(false),
                Value::Null,
                Value::Null,
                Value::Timestamp(day.and_hms_opt(6, 0, 0).unwrap()),
            ],
            vec![
                Value::from(-3),
                Value::from(0.5),
                Value::Null,
                Value::from("x y"),
                Value::Timestamp(day.and_hms_opt(12, 0, 0).unwrap()),
                Value::from("last"),
            ],
        ],
    )
    .unwrap()
}

async fn run(connector: &MockConnector, config: &std::path::Path) -> (Result<(), ExportError>, String, String) {
    let mut console = Console::new(Vec::new(), Vec::new());
    let outcome = Pipeline::new(connector)
        .run(config, &mut console)
        .await
        .map(|_| ());
    let (out, err) = console.into_inner();
    (
        outcome,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

#[tokio::test]
async fn test_scenario_two_rows() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.xlsx");
    let config = write_config(
        dir.path(),
        &DbSettings::default(),
        "SELECT id, name FROM t",
        &output,
        "Results",
    );

    let (outcome, out, _) = run(&MockConnector::returning(people()), &config).await;
    assert_eq!(exit_code(&outcome), 0);
    assert!(out.contains("Rows: 2, Columns: 2"));

    let (names, rows) = read_sheet(&output, "Results");
    assert_eq!(names, vec!["Results".to_string()]);
    assert_eq!(
        rows,
        vec![
            vec![Data::String("id".into()), Data::String("name".into())],
            vec![Data::Float(1.0), Data::String("a".into())],
            vec![Data::Float(2.0), Data::String("b".into())],
        ]
    );
}

#[tokio::test]
async fn test_properties_config_drives_export() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.xlsx");
    let config = write_properties_config(
        dir.path(),
        &DbSettings::default(),
        "SELECT id, name FROM t",
        &output,
        "Results",
    );

    let (outcome, _, _) = run(&MockConnector::returning(people()), &config).await;
    assert_eq!(exit_code(&outcome), 0);

    let (_, rows) = read_sheet(&output, "Results");
    assert_sheet_matches(&rows, &people());
}

#[tokio::test]
async fn test_round_trip_mixed_values() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mixed.xlsx");
    let config = write_config(
        dir.path(),
        &DbSettings::default(),
        "SELECT * FROM products",
        &output,
        "Products",
    );

    let table = mixed();
    let (outcome, _, _) = run(&MockConnector::returning(table.clone()), &config).await;
    outcome.unwrap();

    let (_, rows) = read_sheet(&output, "Products");
    assert_sheet_matches(&rows, &table);
}

#[tokio::test]
async fn test_zero_rows_writes_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.xlsx");
    let config = write_config(
        dir.path(),
        &DbSettings::default(),
        "SELECT id, name FROM t WHERE false",
        &output,
        "Results",
    );
    let empty = TabularResult::new(vec!["id".into(), "name".into()], vec![]).unwrap();

    let (outcome, out, _) = run(&MockConnector::returning(empty.clone()), &config).await;
    outcome.unwrap();
    assert!(out.contains("Rows retrieved: 0"));

    let (_, rows) = read_sheet(&output, "Results");
    assert_eq!(rows.len(), 1);
    assert_sheet_matches(&rows, &empty);
}

#[tokio::test]
async fn test_rerun_produces_identical_content() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.xlsx");
    let config = write_config(
        dir.path(),
        &DbSettings::default(),
        "SELECT * FROM products",
        &output,
        "Results",
    );
    let connector = MockConnector::returning(mixed());

    run(&connector, &config).await.0.unwrap();
    let (_, first) = read_sheet(&output, "Results");

    run(&connector, &config).await.0.unwrap();
    let (_, second) = read_sheet(&output, "Results");

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_config_produces_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::returning(people());

    let (outcome, out, err) = run(&connector, &dir.path().join("config.toml")).await;

    assert_ne!(exit_code(&outcome), 0);
    assert!(matches!(outcome, Err(ExportError::Config(_))));
    assert!(out.is_empty());
    assert!(err.contains("Failed to load configuration"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_malformed_sql_reports_database_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.xlsx");
    let config = write_config(
        dir.path(),
        &DbSettings::default(),
        "SELEC id FROM t",
        &output,
        "Results",
    );
    let connector = MockConnector::failing_query("ERROR: syntax error at or near \"SELEC\"");
    let probe = connector.probe();

    let (outcome, _, err) = run(&connector, &config).await;

    assert_ne!(exit_code(&outcome), 0);
    assert!(err.contains("✗ Process failed"));
    assert!(err.contains("syntax error at or near \"SELEC\""));
    assert!(probe.is_closed());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_each_connection_failure_exits_non_zero() {
    for failure in [
        ConnectFailure::Client,
        ConnectFailure::Authentication,
        ConnectFailure::Network,
    ] {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.xlsx");
        let config = write_config(
            dir.path(),
            &DbSettings::default(),
            "SELECT 1",
            &output,
            "Results",
        );

        let (outcome, out, _) = run(&MockConnector::refusing(failure), &config).await;

        match outcome {
            Err(ExportError::Connection { failure: got, .. }) => assert_eq!(got, failure),
            other => panic!("Expected connection error, got {other:?}"),
        }
        assert!(out.contains("✗ Connection failed"));
        assert!(!output.exists());
    }
}

#[tokio::test]
async fn test_unwritable_output_reports_save_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no-such-dir").join("out.xlsx");
    let config = write_config(
        dir.path(),
        &DbSettings::default(),
        "SELECT id, name FROM t",
        &output,
        "Results",
    );
    let connector = MockConnector::returning(people());
    let mut console = Console::new(Vec::new(), Vec::new());
    let mut pipeline = Pipeline::new(&connector);

    let outcome = pipeline.run(&config, &mut console).await;

    assert!(matches!(outcome, Err(ExportError::Write { .. })));
    assert_eq!(pipeline.stage(), Stage::Failed);
    let (out, _) = console.into_inner();
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("✗ Failed to save Excel file"));
}
