//! Offline tests for the Snowflake provider.

use super::*;
use crate::security::Secret;

fn config() -> SnowflakeConfig {
    SnowflakeConfig {
        account: "acme".to_string(),
        user: "etl".to_string(),
        database: "ANALYTICS".to_string(),
        token: Some(Secret::new("oauth")),
        statement_timeout_secs: 5,
        api_base_url: Some("http://localhost:9999".to_string()),
        ..SnowflakeConfig::default()
    }
}

#[test]
fn test_table_ref_quotes_each_part() {
    assert_eq!(SnowflakeProvider::table_ref("orders"), "\"orders\"");
    assert_eq!(
        SnowflakeProvider::table_ref("MART.orders"),
        "\"MART\".\"orders\""
    );
}

#[test]
fn test_base_url_override() {
    let provider = SnowflakeProvider::new(config()).unwrap();
    assert_eq!(provider.status_url("01ab"), "http://localhost:9999/api/v2/statements/01ab");
    assert!(!format!("{:?}", provider).contains("oauth"));
}

#[tokio::test]
async fn test_unreachable_api_fails_connect() {
    let mut provider = SnowflakeProvider::new(config()).unwrap();
    assert!(matches!(
        provider.connect().await,
        Err(DeltaGuardError::Connection { .. })
    ));
    assert!(!provider.test_connection().await);
    provider.close().await;
}

#[tokio::test]
async fn test_missing_credentials_fail_configuration() {
    let mut provider = SnowflakeProvider::new(SnowflakeConfig {
        token: None,
        ..config()
    })
    .unwrap();
    assert!(matches!(
        provider.connect().await,
        Err(DeltaGuardError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_zero_column_write_is_skipped() {
    let mut provider = SnowflakeProvider::new(config()).unwrap();
    let written = provider
        .write_table("t", &Recordset::empty(Vec::new()), WriteMode::Append)
        .await
        .unwrap();
    assert_eq!(written, 0);
}
