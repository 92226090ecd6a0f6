use serde_json::json;
use sqlsink::error::ErrorKind;
use sqlsink::session::memory::SessionOperation;
use sqlsink::test_utils::messages::{raw_schema_line, record_line, schema_line};
use sqlsink::test_utils::target::{memory_target, run_lines};
use sqlsink::types::{Cell, ColumnType, TableName};
use sqlsink_config::shared::SinkConfig;
use sqlsink_telemetry::init_test_tracing;

fn notes_schema(max_length: u64) -> String {
    schema_line(
        "notes",
        json!({
            "id": {"type": "integer"},
            "body": {"type": "string", "maxLength": max_length}
        }),
        &["id"],
    )
}

fn column_type(columns: &[sqlsink::types::ColumnSchema], name: &str) -> Option<ColumnType> {
    columns
        .iter()
        .find(|column| column.name == name)
        .map(|column| column.column_type.clone())
}

#[tokio::test(flavor = "multi_thread")]
async fn growing_max_length_widens_column_to_text() {
    init_test_tracing();

    let table = TableName::new(None, "notes");
    let long_body = "x".repeat(8500);
    let mut target = memory_target(SinkConfig::default());

    let run = run_lines(
        &mut target,
        &[
            notes_schema(50),
            record_line("notes", json!({"id": 1, "body": "short"})),
            notes_schema(9000),
            record_line("notes", json!({"id": 2, "body": long_body})),
        ],
    )
    .await;

    let summary = run.result.unwrap();
    assert_eq!(summary.batches, 2);
    let session = target.session();
    let columns = session.column_schemas(&table).await.unwrap();
    assert_eq!(column_type(&columns, "body"), Some(ColumnType::Text));
    assert!(session.operations().await.contains(&SessionOperation::AlterColumn {
        table: table.clone(),
        column: "body".to_string(),
        column_type: ColumnType::Text,
    }));

    let rows = session.table_rows(&table).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].values()[1], Cell::String(long_body));
}

#[tokio::test(flavor = "multi_thread")]
async fn value_longer_than_column_fails_without_widening() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            notes_schema(5),
            record_line("notes", json!({"id": 1, "body": "longer than five"})),
        ],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::DestinationQueryFailed);
    let session = target.session();
    assert!(session.table_rows(&TableName::new(None, "notes")).await.is_empty());
    assert!(session.staging_tables().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn new_property_adds_column_and_dropped_property_is_kept() {
    init_test_tracing();

    let table = TableName::new(None, "notes");
    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            notes_schema(50),
            record_line("notes", json!({"id": 1, "body": "kept"})),
            schema_line(
                "notes",
                json!({"id": {"type": "integer"}, "pinned": {"type": "boolean"}}),
                &["id"],
            ),
            record_line("notes", json!({"id": 1, "pinned": true})),
        ],
    )
    .await;

    run.result.unwrap();
    let session = target.session();
    let columns = session.column_schemas(&table).await.unwrap();
    let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["id", "body", "pinned"]);

    let rows = session.table_rows(&table).await;
    assert_eq!(
        rows[0].values(),
        &[
            Cell::I64(1),
            Cell::String("kept".to_string()),
            Cell::Bool(true)
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn incompatible_type_change_fails() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            notes_schema(50),
            record_line("notes", json!({"id": 1, "body": "text"})),
            schema_line(
                "notes",
                json!({"id": {"type": "integer"}, "body": {"type": "integer"}}),
                &["id"],
            ),
            record_line("notes", json!({"id": 2, "body": 3})),
        ],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::IncompatibleTypes);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_alter_names_the_transition() {
    init_test_tracing();

    let config = SinkConfig {
        allow_column_alter: false,
        ..SinkConfig::default()
    };
    let mut target = memory_target(config);
    let run = run_lines(
        &mut target,
        &[
            notes_schema(50),
            record_line("notes", json!({"id": 1, "body": "a"})),
            notes_schema(100),
            record_line("notes", json!({"id": 2, "body": "b"})),
        ],
    )
    .await;

    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert_eq!(
        err.detail(),
        Some("column `body` of table `notes` needs VARCHAR(50) -> VARCHAR(100)")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_without_properties_creates_no_table() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            raw_schema_line("empty", json!({"type": "object", "properties": {}}), &[]),
            record_line("empty", json!({"anything": 1})),
        ],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::InvalidSchema);
    assert!(target.session().tables().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_missing_properties_is_rejected() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[raw_schema_line("broken", json!({"type": "object"}), &[])],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::InvalidSchema);
}
