//! Offline tests for the BigQuery provider. HTTP behavior is covered by the
//! wiremock suite in `tests/warehouse_http.rs`.

use super::*;
use crate::security::Secret;

fn provider(dataset: Option<&str>) -> BigQueryProvider {
    BigQueryProvider::new(BigQueryConfig {
        project_id: Some("acme".to_string()),
        dataset: dataset.map(str::to_string),
        access_token: Some(Secret::new("token")),
        api_base_url: Some("http://localhost:9999/".to_string()),
        ..BigQueryConfig::default()
    })
    .unwrap()
}

#[test]
fn test_table_reference_forms() {
    let bq = provider(Some("sales"));

    let short = bq.table_reference("acme", "orders").unwrap();
    assert_eq!(short.dataset_id, "sales");
    assert_eq!(short.table_id, "orders");

    let dataset = bq.table_reference("acme", "mart.orders").unwrap();
    assert_eq!(dataset.project_id, "acme");
    assert_eq!(dataset.dataset_id, "mart");

    let full = bq.table_reference("acme", "other.mart.orders").unwrap();
    assert_eq!(full.project_id, "other");
    assert_eq!(full.sql_path(), "`other.mart.orders`");
}

#[test]
fn test_table_reference_rejects_bad_names() {
    let bq = provider(None);
    assert!(matches!(
        bq.table_reference("acme", "orders"),
        Err(DeltaGuardError::Configuration { .. })
    ));
    assert!(bq.table_reference("acme", "a.b.c.d").is_err());
    assert!(bq.table_reference("acme", "mart.").is_err());
}

#[test]
fn test_api_root_override_is_normalized() {
    let bq = provider(None);
    assert_eq!(
        bq.api("/projects/acme/queries"),
        "http://localhost:9999/bigquery/v2/projects/acme/queries"
    );
    assert_eq!(
        bq.upload("/projects/acme/jobs"),
        "http://localhost:9999/upload/bigquery/v2/projects/acme/jobs"
    );
}

#[tokio::test]
async fn test_list_tables_without_dataset_is_empty() {
    let mut bq = provider(None);
    assert!(bq.list_tables(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_write_probe_without_dataset_passes() {
    let mut bq = provider(None);
    assert!(bq.probe_write().await.is_ok());
}

#[tokio::test]
async fn test_zero_column_write_is_skipped() {
    let mut bq = provider(Some("sales"));
    let written = bq
        .write_table("orders", &Recordset::empty(Vec::new()), WriteMode::Append)
        .await
        .unwrap();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_unreachable_api_is_connection_error() {
    let mut bq = provider(Some("sales"));
    let result = bq.connect().await;
    assert!(matches!(result, Err(DeltaGuardError::Connection { .. })));
    assert!(!bq.test_connection().await);
    bq.close().await;
    bq.close().await;
}
