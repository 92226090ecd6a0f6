use serde_json::json;
use sqlsink::error::ErrorKind;
use sqlsink::session::memory::MemorySession;
use sqlsink::target::Target;
use sqlsink::test_utils::messages::{
    activate_version_line, raw_schema_line, record_line, schema_line, state_line,
};
use sqlsink::test_utils::target::{memory_target, run_lines};
use sqlsink::types::TableName;
use sqlsink_config::shared::{BatchConfig, SinkConfig};
use sqlsink_telemetry::init_test_tracing;

fn accounts_schema() -> String {
    schema_line(
        "crm-accounts",
        json!({"id": {"type": "integer"}, "plan": {"type": "string"}}),
        &["id"],
    )
}

fn orders_schema() -> String {
    schema_line(
        "crm-orders",
        json!({"order_id": {"type": "string"}, "total": {"type": "number"}}),
        &["order_id"],
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn record_before_schema_fails() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[record_line("crm-accounts", json!({"id": 1}))],
    )
    .await;

    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingStreamSchema);
    assert_eq!(err.detail(), Some("stream `crm-accounts`"));
    assert!(target.session().tables().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn record_without_key_fails() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            accounts_schema(),
            record_line("crm-accounts", json!({"plan": "free"})),
        ],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::InvalidData);
}

#[tokio::test(flavor = "multi_thread")]
async fn record_without_required_property_fails() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            raw_schema_line(
                "logs",
                json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}, "level": {"type": "string"}},
                    "required": ["level"]
                }),
                &[],
            ),
            record_line("logs", json!({"message": "hello", "level": "info"})),
            record_line("logs", json!({"message": "no level"})),
        ],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::InvalidData);
}

#[tokio::test(flavor = "multi_thread")]
async fn key_missing_from_properties_fails() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[schema_line(
            "crm-accounts",
            json!({"plan": {"type": "string"}}),
            &["id"],
        )],
    )
    .await;

    assert_eq!(run.result.unwrap_err().kind(), ErrorKind::InvalidSchema);
}

#[tokio::test(flavor = "multi_thread")]
async fn states_follow_loaded_records_across_streams() {
    init_test_tracing();

    let mut target = Target::new(
        MemorySession::new(),
        SinkConfig::default(),
        BatchConfig { max_size: 2 },
    );
    let run = run_lines(
        &mut target,
        &[
            accounts_schema(),
            orders_schema(),
            state_line(json!({"bookmark": 0})),
            record_line("crm-accounts", json!({"id": 1, "plan": "free"})),
            record_line("crm-orders", json!({"order_id": "a-1", "total": 12.5})),
            state_line(json!({"bookmark": 1})),
            record_line("crm-accounts", json!({"id": 2, "plan": "pro"})),
            record_line("crm-orders", json!({"order_id": "a-2", "total": 3})),
            state_line(json!({"bookmark": 2})),
        ],
    )
    .await;

    let summary = run.result.unwrap();
    assert_eq!(summary.messages, 9);
    assert_eq!(summary.records, 4);
    assert_eq!(summary.batches, 3);
    assert_eq!(
        run.states,
        vec![
            json!({"bookmark": 0}),
            json!({"bookmark": 1}),
            json!({"bookmark": 2})
        ]
    );

    let session = target.session();
    let accounts = TableName::new(Some("crm".to_string()), "accounts");
    let orders = TableName::new(Some("crm".to_string()), "orders");
    assert_eq!(session.table_rows(&accounts).await.len(), 2);
    assert_eq!(session.table_rows(&orders).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_lines_and_activate_version_are_skipped() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[
            accounts_schema(),
            String::new(),
            activate_version_line("crm-accounts", 1),
            record_line("crm-accounts", json!({"id": 1, "plan": "free"})),
            "   ".to_string(),
        ],
    )
    .await;

    let summary = run.result.unwrap();
    assert_eq!(summary.messages, 3);
    assert_eq!(summary.records, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_line_reports_its_number() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig::default());
    let run = run_lines(
        &mut target,
        &[accounts_schema(), "{\"type\": \"RECORD\"".to_string()],
    )
    .await;

    let err = run.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeserializationError);
    assert!(err.detail().unwrap().starts_with("line 2:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_names_are_conformed() {
    init_test_tracing();

    let mut target = memory_target(SinkConfig {
        table_prefix: Some("raw_".to_string()),
        ..SinkConfig::default()
    });
    let run = run_lines(
        &mut target,
        &[
            schema_line(
                "public-CustomerOrders",
                json!({"OrderId": {"type": "integer"}, "Total Amount": {"type": "number"}}),
                &["OrderId"],
            ),
            record_line(
                "public-CustomerOrders",
                json!({"OrderId": 1, "Total Amount": 10.25}),
            ),
            schema_line("2ndTable", json!({"id": {"type": "integer"}}), &[]),
            record_line("2ndTable", json!({"id": 1})),
        ],
    )
    .await;

    run.result.unwrap();
    let session = target.session();
    let orders = TableName::new(Some("dbo".to_string()), "raw_customer_orders");
    let columns = session.column_schemas(&orders).await.unwrap();
    let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["order_id", "total_amount"]);
    assert_eq!(
        session
            .table_rows(&TableName::new(None, "raw__2nd_table"))
            .await
            .len(),
        1
    );
}
