//! MySQL provider round trips against a real server in a container.
//!
//! Requires Docker; run with `cargo test -- --ignored`.

#![allow(clippy::unwrap_used)]
#![cfg(feature = "mysql")]

use deltaguard_core::{Capability, Provider, Recordset, WriteMode, create_provider_from};
use serde_json::json;
use testcontainers_modules::{mysql::Mysql, testcontainers::runners::AsyncRunner};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_container_mysql_write_read_delete() {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let url = format!("mysql://root@localhost:{port}/test");

    let mut provider = create_provider_from(&url).unwrap();
    assert!(provider.test_connection().await);
    assert!(
        provider
            .has_permissions(&[Capability::Read, Capability::Write])
            .await
            .all_granted()
    );

    let data = Recordset::from_rows(
        vec!["sku", "title"],
        vec![
            vec![json!(1), json!("lamp")],
            vec![json!(2), json!(null)],
            vec![json!(3), json!("desk")],
        ],
    )
    .unwrap();
    provider
        .write_table("products", &data, WriteMode::Replace)
        .await
        .unwrap();
    provider
        .write_table("products", &data.head(Some(1)), WriteMode::Append)
        .await
        .unwrap();

    let read = provider.read_table("products", None).await.unwrap();
    assert_eq!(read.len(), 4);
    assert_eq!(&read.rows()[..3], data.rows());
    assert_eq!(provider.list_tables(None).await.unwrap(), vec!["products"]);

    let deleted = provider
        .delete_rows("products", Some("`sku` = 1"))
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    provider.delete_table("products").await.unwrap();
    provider.close().await;
}
