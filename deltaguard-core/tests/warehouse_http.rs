//! BigQuery and Snowflake providers against mocked REST APIs.
//!
//! Both providers accept an `api_base_url` override, which points them at a
//! local wiremock server. Credentials are static tokens so no key files or
//! token exchanges are involved.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
use deltaguard_core::{
    DeltaGuardError, Provider, Recordset, WriteMode, providers::config::ProviderConfig,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, body_string_contains, header, method, path, query_param},
};

fn orders() -> Recordset {
    Recordset::from_rows(
        vec!["id", "name"],
        vec![vec![json!(1), json!("Ada")], vec![json!(2), json!("Grace")]],
    )
    .unwrap()
}

#[cfg(feature = "bigquery")]
mod bigquery {
    use deltaguard_core::providers::bigquery::BigQueryProvider;
    use deltaguard_core::providers::config::BigQueryConfig;
    use deltaguard_core::security::Secret;

    use super::*;

    const QUERIES: &str = "/bigquery/v2/projects/proj/queries";
    const ORDERS_TABLE: &str = "/bigquery/v2/projects/proj/datasets/sales/tables/orders";

    fn provider(server: &MockServer) -> BigQueryProvider {
        BigQueryProvider::new(BigQueryConfig {
            project_id: Some("proj".to_string()),
            dataset: Some("sales".to_string()),
            access_token: Some(Secret::new("test-token")),
            api_base_url: Some(format!("{}/", server.uri())),
            ..BigQueryConfig::default()
        })
        .unwrap()
    }

    fn select_one() -> serde_json::Value {
        json!({
            "jobComplete": true,
            "schema": {"fields": [{"name": "f0_", "type": "INTEGER"}]},
            "rows": [{"f": [{"v": "1"}]}]
        })
    }

    #[tokio::test]
    async fn test_connect_and_ping_send_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/proj/datasets"))
            .and(query_param("maxResults", "1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"datasets": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(QUERIES))
            .and(body_partial_json(json!({"query": "SELECT 1", "useLegacySql": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(select_one()))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        assert!(provider.test_connection().await);
        provider.close().await;
    }

    #[tokio::test]
    async fn test_rejected_token_is_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let err = provider.connect().await.unwrap_err();
        assert!(matches!(err, DeltaGuardError::Connection { .. }));
        assert!(!err.to_string().contains("test-token"));
    }

    #[tokio::test]
    async fn test_read_table_polls_and_pages() {
        let server = MockServer::start().await;
        let schema = json!({"fields": [
            {"name": "id", "type": "INTEGER"},
            {"name": "name", "type": "STRING"}
        ]});
        Mock::given(method("POST"))
            .and(path(QUERIES))
            .and(body_partial_json(json!({"query": "SELECT * FROM `proj.sales.orders`"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": false,
                "jobReference": {"jobId": "job_1", "location": "EU"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{QUERIES}/job_1")))
            .and(query_param("pageToken", "page_2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": true,
                "schema": schema,
                "rows": [{"f": [{"v": "2"}, {"v": "Grace"}]}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{QUERIES}/job_1")))
            .and(query_param("location", "EU"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": true,
                "jobReference": {"jobId": "job_1", "location": "EU"},
                "schema": schema,
                "rows": [{"f": [{"v": "1"}, {"v": "Ada"}]}],
                "pageToken": "page_2"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let data = provider.read_table("orders", None).await.unwrap();
        assert_eq!(data.column_names(), vec!["id", "name"]);
        assert_eq!(data.rows(), orders().rows());
    }

    #[tokio::test]
    async fn test_missing_table_is_read_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERIES))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "Not found: Table proj:sales.nope"}
            })))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let result = provider.read_table("sales.nope", Some(10)).await;
        assert!(matches!(result, Err(DeltaGuardError::Read { .. })));
    }

    #[tokio::test]
    async fn test_replace_write_recreates_and_loads() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(ORDERS_TABLE))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ORDERS_TABLE))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bigquery/v2/projects/proj/datasets/sales/tables"))
            .and(body_partial_json(json!({
                "tableReference": {"projectId": "proj", "datasetId": "sales", "tableId": "orders"},
                "schema": {"fields": [
                    {"name": "id", "type": "INT64"},
                    {"name": "name", "type": "STRING"}
                ]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .and(query_param("uploadType", "multipart"))
            .and(body_string_contains("\"name\":\"Grace\""))
            .and(body_string_contains("NEWLINE_DELIMITED_JSON"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobReference": {"jobId": "load_1"},
                "status": {"state": "DONE"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let written = provider
            .write_table("orders", &orders(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_failed_load_job_is_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ORDERS_TABLE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobReference": {"jobId": "load_2"},
                "status": {
                    "state": "DONE",
                    "errorResult": {"reason": "invalid", "message": "bad row"}
                }
            })))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let result = provider
            .write_table("orders", &orders(), WriteMode::Append)
            .await;
        assert!(matches!(result, Err(DeltaGuardError::Write { .. })));
    }

    #[tokio::test]
    async fn test_append_to_existing_table_loads_without_schema() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ORDERS_TABLE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "schema": {"fields": [
                    {"name": "id", "type": "INTEGER"},
                    {"name": "placed_at", "type": "TIMESTAMP"}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/bigquery/v2/projects/proj/jobs"))
            .and(body_string_contains("CREATE_NEVER"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobReference": {"jobId": "load_3"},
                "status": {"state": "DONE"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data = Recordset::from_rows(
            vec!["id", "placed_at"],
            vec![vec![json!(3), json!("2024-05-01 10:00:00 UTC")]],
        )
        .unwrap();
        let mut provider = provider(&server);
        let written = provider
            .write_table("orders", &data, WriteMode::Append)
            .await
            .unwrap();
        assert_eq!(written, 1);

        let requests = server.received_requests().await.unwrap();
        let upload = requests
            .iter()
            .find(|r| r.url.path().starts_with("/upload/"))
            .expect("load job request");
        let body = String::from_utf8_lossy(&upload.body);
        assert!(!body.contains("\"schema\""), "{}", body);
        assert!(body.contains("2024-05-01 10:00:00 UTC"));
        // Existing tables are never recreated
        assert!(!requests.iter().any(|r| r.method.as_str() == "POST"
            && r.url.path().ends_with("/datasets/sales/tables")));
    }

    #[tokio::test]
    async fn test_delete_rows_reports_affected_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERIES))
            .and(body_partial_json(json!({
                "query": "DELETE FROM `proj.sales.orders` WHERE TRUE"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobComplete": true,
                "numDmlAffectedRows": "7"
            })))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        assert_eq!(provider.delete_rows("orders", None).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_list_datasets_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/proj/datasets"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasets": [{"datasetReference": {"datasetId": "raw"}}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bigquery/v2/projects/proj/datasets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datasets": [{"datasetReference": {"datasetId": "sales"}}],
                "nextPageToken": "next"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        assert_eq!(provider.list_datasets().await.unwrap(), vec!["sales", "raw"]);
    }

    #[tokio::test]
    async fn test_registry_builds_bigquery_from_json() {
        let server = MockServer::start().await;
        let config = ProviderConfig::from_json_str(
            &json!({
                "backend": "bigquery",
                "project_id": "proj",
                "access_token": "t",
                "api_base_url": server.uri()
            })
            .to_string(),
        )
        .unwrap();
        let provider = deltaguard_core::create_provider(config).unwrap();
        assert_eq!(provider.backend().as_str(), "bigquery");
    }
}

#[cfg(feature = "snowflake")]
mod snowflake {
    use deltaguard_core::providers::config::SnowflakeConfig;
    use deltaguard_core::providers::snowflake::SnowflakeProvider;
    use deltaguard_core::security::Secret;

    use super::*;

    const STATEMENTS: &str = "/api/v2/statements";

    fn provider(server: &MockServer) -> SnowflakeProvider {
        SnowflakeProvider::new(SnowflakeConfig {
            account: "acme-prod".to_string(),
            database: "ANALYTICS".to_string(),
            schema: Some("PUBLIC".to_string()),
            warehouse: Some("ETL_WH".to_string()),
            token: Some(Secret::new("oauth-token")),
            api_base_url: Some(server.uri()),
            ..SnowflakeConfig::default()
        })
        .unwrap()
    }

    fn ok_response() -> serde_json::Value {
        json!({
            "code": "090001",
            "statementHandle": "h-ok",
            "resultSetMetaData": {
                "numRows": 1,
                "rowType": [{"name": "status", "type": "text"}],
                "partitionInfo": [{"rowCount": 1}]
            },
            "data": [["ok"]]
        })
    }

    /// Lowest-priority catch-all for statements a test does not inspect
    async fn accept_all(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_response()))
            .with_priority(10)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_statements_carry_oauth_headers_and_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(header("authorization", "Bearer oauth-token"))
            .and(header("x-snowflake-authorization-token-type", "OAUTH"))
            .and(body_partial_json(json!({
                "statement": "SELECT 1",
                "database": "ANALYTICS",
                "schema": "PUBLIC",
                "warehouse": "ETL_WH"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_response()))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        assert!(provider.test_connection().await);
        provider.close().await;
        provider.close().await;
    }

    #[tokio::test]
    async fn test_read_table_polls_and_merges_partitions() {
        let server = MockServer::start().await;
        accept_all(&server).await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(body_partial_json(json!({"statement": "SELECT * FROM \"ORDERS\""})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "code": "333334",
                "message": "Asynchronous execution in progress.",
                "statementHandle": "h-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{STATEMENTS}/h-1")))
            .and(query_param("partition", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [["2", "Grace"]]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{STATEMENTS}/h-1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "090001",
                "statementHandle": "h-1",
                "resultSetMetaData": {
                    "numRows": 2,
                    "rowType": [
                        {"name": "id", "type": "fixed", "scale": 0},
                        {"name": "name", "type": "text"}
                    ],
                    "partitionInfo": [{"rowCount": 1}, {"rowCount": 1}]
                },
                "data": [["1", "Ada"]]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let data = provider.read_table("ORDERS", None).await.unwrap();
        assert_eq!(data.column_names(), vec!["id", "name"]);
        assert_eq!(data.rows(), orders().rows());
    }

    #[tokio::test]
    async fn test_write_binds_values_as_text() {
        let server = MockServer::start().await;
        accept_all(&server).await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(body_partial_json(json!({
                "statement": "INSERT INTO \"ORDERS\" (\"id\", \"name\") VALUES (?, ?), (?, ?)",
                "bindings": {
                    "1": {"type": "TEXT", "value": "1"},
                    "2": {"type": "TEXT", "value": "Ada"},
                    "3": {"type": "TEXT", "value": "2"},
                    "4": {"type": "TEXT", "value": "Grace"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "090001",
                "statementHandle": "h-ins",
                "stats": {"numRowsInserted": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let written = provider
            .write_table("ORDERS", &orders(), WriteMode::Append)
            .await
            .unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_delete_rows_reads_dml_stats() {
        let server = MockServer::start().await;
        accept_all(&server).await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(body_partial_json(json!({
                "statement": "DELETE FROM \"ORDERS\" WHERE \"id\" = 1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "090001",
                "statementHandle": "h-del",
                "stats": {"numRowsDeleted": 3}
            })))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let deleted = provider
            .delete_rows("ORDERS", Some("\"id\" = 1"))
            .await
            .unwrap();
        assert_eq!(deleted, 3);
    }

    #[tokio::test]
    async fn test_sql_error_on_read_is_read_error() {
        let server = MockServer::start().await;
        accept_all(&server).await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(body_partial_json(json!({"statement": "SELECT * FROM \"MISSING\""})))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "code": "002003",
                "message": "Object 'MISSING' does not exist or not authorized."
            })))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let result = provider.read_table("MISSING", None).await;
        assert!(matches!(result, Err(DeltaGuardError::Read { .. })));
    }

    #[tokio::test]
    async fn test_write_probe_is_granted_with_temp_table() {
        let server = MockServer::start().await;
        accept_all(&server).await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(body_partial_json(json!({
                "statement": "CREATE TEMPORARY TABLE \"PERM_TEST\" (c STRING)"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_response()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(STATEMENTS))
            .and(body_partial_json(json!({
                "statement": "DROP TABLE IF EXISTS \"PERM_TEST\""
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_response()))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        let report = provider
            .has_permissions(&[deltaguard_core::Capability::Write])
            .await;
        assert!(report.all_granted());
    }
}
