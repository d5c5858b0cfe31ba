//! S3 provider tests over an in-memory object store.

use super::*;
use object_store::memory::InMemory;
use serde_json::json;

fn provider(prefix: Option<&str>) -> (S3Provider, Arc<InMemory>) {
    let store = Arc::new(InMemory::new());
    let mut config = S3Config::default().with_bucket("lake");
    if let Some(prefix) = prefix {
        config = config.with_prefix(prefix);
    }
    (S3Provider::with_store(config, store.clone()), store)
}

fn people() -> Recordset {
    Recordset::from_rows(
        vec!["id", "name"],
        vec![
            vec![json!(1), json!("Ada")],
            vec![json!(2), json!("Grace")],
            vec![json!(3), json!("Linus")],
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_write_then_read_csv() {
    let (mut s3, store) = provider(Some("exports"));
    assert_eq!(s3.write_table("people.csv", &people(), WriteMode::Replace).await.unwrap(), 3);

    let raw = store
        .get(&Path::from("exports/people.csv"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&raw[..], b"id,name\n1,Ada\n2,Grace\n3,Linus\n");

    let read = s3.read_table("people.csv", Some(2)).await.unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read.rows()[1], vec![json!(2), json!("Grace")]);
}

#[tokio::test]
async fn test_append_concatenates_existing_object() {
    let (mut s3, _) = provider(None);
    s3.write_table("people.parquet", &people(), WriteMode::Append).await.unwrap();
    s3.write_table("people.parquet", &people(), WriteMode::Append).await.unwrap();

    let read = s3.read_table("people.parquet", None).await.unwrap();
    assert_eq!(read.len(), 6);
    assert_eq!(read.rows()[3], people().rows()[0]);

    s3.write_table("people.parquet", &people(), WriteMode::Replace).await.unwrap();
    assert_eq!(s3.read_table("people.parquet", Some(0)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_object_is_read_error() {
    let (mut s3, _) = provider(None);
    assert!(matches!(
        s3.read_table("absent.csv", None).await,
        Err(DeltaGuardError::Read { .. })
    ));
}

#[tokio::test]
async fn test_delete_rows_with_predicate() {
    let (mut s3, _) = provider(None);
    s3.write_table("people.csv", &people(), WriteMode::Replace).await.unwrap();

    assert_eq!(s3.delete_rows("people.csv", Some("id >= 2")).await.unwrap(), 2);
    let remaining = s3.read_table("people.csv", None).await.unwrap();
    assert_eq!(remaining.rows(), &people().rows()[..1]);

    assert_eq!(s3.delete_rows("people.csv", None).await.unwrap(), 1);
    let empty = s3.read_table("people.csv", None).await.unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.column_names(), vec!["id", "name"]);
}

#[tokio::test]
async fn test_bad_predicate_leaves_object_untouched() {
    let (mut s3, _) = provider(None);
    s3.write_table("people.csv", &people(), WriteMode::Replace).await.unwrap();

    let result = s3.delete_rows("people.csv", Some("nickname = 'x'")).await;
    assert!(matches!(result, Err(DeltaGuardError::Query { .. })));
    assert_eq!(s3.read_table("people.csv", None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_probes_leave_no_residue() {
    let (mut s3, _) = provider(None);
    let report = s3
        .has_permissions(&[crate::models::Capability::Read, crate::models::Capability::Write])
        .await;
    assert!(report.all_granted());
    assert!(s3.list_tables(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_and_delete_table() {
    let (mut s3, _) = provider(Some("raw/"));
    s3.write_table("a.csv", &people(), WriteMode::Replace).await.unwrap();
    s3.write_table("b.csv", &people(), WriteMode::Replace).await.unwrap();

    let mut keys = s3.list_tables(None).await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["raw/a.csv", "raw/b.csv"]);
    assert_eq!(s3.list_datasets().await.unwrap(), vec!["lake"]);

    s3.delete_table("a.csv").await.unwrap();
    s3.delete_table("a.csv").await.unwrap();
    assert_eq!(s3.list_tables(None).await.unwrap(), vec!["raw/b.csv"]);
}

#[tokio::test]
async fn test_default_key_used_for_empty_name() {
    let store = Arc::new(InMemory::new());
    let config = S3Config {
        key: Some("daily.csv".to_string()),
        ..S3Config::default().with_bucket("lake")
    };
    let mut s3 = S3Provider::with_store(config, store);
    s3.write_table("", &people(), WriteMode::Replace).await.unwrap();
    assert_eq!(s3.read_table("daily.csv", None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_close_keeps_injected_store() {
    let (mut s3, _) = provider(None);
    s3.write_table("people.csv", &people(), WriteMode::Replace).await.unwrap();
    s3.close().await;
    assert_eq!(s3.read_table("people.csv", None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_connect_lists_the_bucket() {
    use crate::security::Secret;
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            "<Error><Code>InvalidAccessKeyId</Code><Message>denied</Message></Error>",
        ))
        .expect(1..)
        .mount(&server)
        .await;

    let config = S3Config {
        endpoint: Some(server.uri()),
        allow_http: true,
        access_key_id: Some(Secret::new("AKIDEXAMPLE")),
        secret_access_key: Some(Secret::new("wrong")),
        ..S3Config::default().with_bucket("lake")
    };
    let mut s3 = S3Provider::new(config);

    let result = s3.connect().await;
    assert!(matches!(result, Err(DeltaGuardError::Connection { .. })));
    assert!(!s3.test_connection().await);
}

#[tokio::test]
async fn test_connect_succeeds_on_reachable_store() {
    let (mut s3, _) = provider(Some("exports"));
    s3.connect().await.unwrap();
}
