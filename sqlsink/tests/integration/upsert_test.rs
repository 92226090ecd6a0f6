use serde_json::json;
use sqlsink::error::ErrorKind;
use sqlsink::session::memory::{OperationKind, SessionOperation};
use sqlsink::test_utils::messages::{record_line, schema_line};
use sqlsink::test_utils::target::{memory_target, run_lines};
use sqlsink::types::{Cell, TableName, TableRow};
use sqlsink_config::shared::SinkConfig;
use sqlsink_telemetry::init_test_tracing;

fn users_schema() -> String {
    schema_line(
        "app-users",
        json!({
            "id": {"type": "integer"},
            "name": {"type": "string", "maxLength": 50}
        }),
        &["id"],
    )
}

fn users_table() -> TableName {
    TableName::new(Some("app".to_string()), "users")
}

#[tokio::test(flavor = "multi_thread")]
async fn second_batch_updates_row_with_same_key() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let first = run_lines(
        &mut target,
        &[
            users_schema(),
            record_line("app-users", json!({"id": 1, "name": "a"})),
        ],
    )
    .await;
    first.result.unwrap();

    let second = run_lines(
        &mut target,
        &[
            users_schema(),
            record_line("app-users", json!({"id": 1, "name": "b"})),
        ],
    )
    .await;
    second.result.unwrap();

    let rows = target.session().table_rows(&users_table()).await;
    assert_eq!(
        rows,
        vec![TableRow::new(vec![
            Cell::I64(1),
            Cell::String("b".to_string())
        ])]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn reapplying_identical_batch_is_idempotent() {
    init_test_tracing();

    let lines = vec![
        users_schema(),
        record_line("app-users", json!({"id": 1, "name": "a"})),
        record_line("app-users", json!({"id": 2, "name": "b"})),
    ];
    let mut target = memory_target(SinkConfig::default());

    run_lines(&mut target, &lines).await.result.unwrap();
    let before = target.session().table_rows(&users_table()).await;
    run_lines(&mut target, &lines).await.result.unwrap();
    let after = target.session().table_rows(&users_table()).await;

    assert_eq!(before.len(), 2);
    assert_eq!(before, after);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_keys_in_one_batch_keep_last_record() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            users_schema(),
            record_line("app-users", json!({"id": 7, "name": "first"})),
            record_line("app-users", json!({"id": 8, "name": "other"})),
            record_line("app-users", json!({"id": 7, "name": "last"})),
        ],
    )
    .await;

    let summary = run.result.unwrap();
    assert_eq!(summary.records, 3);
    let rows = target.session().table_rows(&users_table()).await;
    assert_eq!(
        rows,
        vec![
            TableRow::new(vec![Cell::I64(8), Cell::String("other".to_string())]),
            TableRow::new(vec![Cell::I64(7), Cell::String("last".to_string())]),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn text_keys_match_ignoring_case_and_trailing_spaces() {
    init_test_tracing();

    let schema = schema_line(
        "app-codes",
        json!({
            "code": {"type": "string", "maxLength": 10},
            "label": {"type": "string"}
        }),
        &["code"],
    );
    let mut target = memory_target(SinkConfig::default());
    run_lines(
        &mut target,
        &[
            schema.clone(),
            record_line("app-codes", json!({"code": "A", "label": "first"})),
        ],
    )
    .await
    .result
    .unwrap();

    run_lines(
        &mut target,
        &[
            schema,
            record_line("app-codes", json!({"code": "a", "label": "second"})),
            record_line("app-codes", json!({"code": "a ", "label": "third"})),
        ],
    )
    .await
    .result
    .unwrap();

    let rows = target
        .session()
        .table_rows(&TableName::new(Some("app".to_string()), "codes"))
        .await;
    assert_eq!(
        rows,
        vec![TableRow::new(vec![
            Cell::String("A".to_string()),
            Cell::String("third".to_string())
        ])]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_merge_leaves_table_untouched() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    run_lines(
        &mut target,
        &[
            users_schema(),
            record_line("app-users", json!({"id": 1, "name": "a"})),
        ],
    )
    .await
    .result
    .unwrap();
    target.session().fail_next(OperationKind::Merge).await;

    let run = run_lines(
        &mut target,
        &[
            users_schema(),
            record_line("app-users", json!({"id": 1, "name": "changed"})),
            record_line("app-users", json!({"id": 2, "name": "new"})),
        ],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::MergeExecutionFailed);
    let session = target.session();
    assert_eq!(
        session.table_rows(&users_table()).await,
        vec![TableRow::new(vec![
            Cell::I64(1),
            Cell::String("a".to_string())
        ])]
    );
    assert!(session.staging_tables().await.is_empty());
    assert!(matches!(
        session.operations().await.last(),
        Some(SessionOperation::DropStagingTable(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn unkeyed_stream_appends_rows() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let events = schema_line(
        "events",
        json!({"kind": {"type": "string"}, "at": {"type": "string", "format": "date-time"}}),
        &[],
    );
    let record = record_line("events", json!({"kind": "click", "at": "2024-03-01T10:00:00Z"}));

    run_lines(&mut target, &[events.clone(), record.clone()])
        .await
        .result
        .unwrap();
    run_lines(&mut target, &[events, record]).await.result.unwrap();

    let session = target.session();
    assert_eq!(
        session
            .table_rows(&TableName::new(None, "events"))
            .await
            .len(),
        2
    );
    assert!(
        session
            .operations()
            .await
            .iter()
            .all(|op| op.kind() != OperationKind::Merge)
    );
}
