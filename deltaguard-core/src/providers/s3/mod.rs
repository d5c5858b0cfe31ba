//! S3 object-storage provider.
//!
//! A "table" is one object whose key is the table name under the configured
//! prefix. The object format follows the key suffix (see
//! [`crate::formats::TableFormat`]). Every write rewrites the whole object;
//! appends read the existing object first.
//!
//! Row deletes evaluate the predicate in memory with
//! [`crate::predicate::Predicate`].

#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use object_store::{ObjectStore, PutPayload, aws::AmazonS3Builder, path::Path};

use crate::{
    Result,
    error::DeltaGuardError,
    formats::TableFormat,
    models::{BackendKind, Recordset, WriteMode},
    predicate::Predicate,
    providers::{Provider, config::S3Config},
};

/// Object written and removed by the write probe
const PROBE_KEY: &str = "__perm_test__.txt";
/// Upper bound on keys returned by `list_tables`
const MAX_LISTED_KEYS: usize = 200;

/// Provider for one bucket.
pub struct S3Provider {
    config: S3Config,
    store: Option<Arc<dyn ObjectStore>>,
    /// Store supplied by the caller; kept across `close`
    injected: bool,
}

impl std::fmt::Debug for S3Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Provider")
            .field("config", &self.config.to_string())
            .field("connected", &self.store.is_some())
            .finish()
    }
}

impl S3Provider {
    /// Creates an unconnected provider.
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            store: None,
            injected: false,
        }
    }

    /// Creates a provider over an existing store, such as
    /// `object_store::memory::InMemory`.
    pub fn with_store(config: S3Config, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store: Some(store),
            injected: true,
        }
    }

    fn build_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let bucket = self.config.require_bucket()?;
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(&self.config.region)
            .with_allow_http(self.config.allow_http);
        if let (Some(key_id), Some(secret)) =
            (&self.config.access_key_id, &self.config.secret_access_key)
        {
            builder = builder
                .with_access_key_id(key_id.expose())
                .with_secret_access_key(secret.expose());
        }
        if let Some(token) = &self.config.session_token {
            builder = builder.with_token(token.expose());
        }
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        let store = builder.build().map_err(|e| {
            DeltaGuardError::configuration(format!("s3: invalid store configuration: {}", e))
        })?;
        Ok(Arc::new(store))
    }

    fn prefix_path(&self) -> Option<Path> {
        self.config
            .prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(Path::from)
    }

    fn store(&mut self) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        let store = self.build_store()?;
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Reads and decodes an object; `None` when it does not exist.
    async fn load(&mut self, key: &str) -> Result<Option<Recordset>> {
        let store = self.store()?;
        let path = Path::from(key);
        let result = match store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(DeltaGuardError::read_failed(format!("Failed to get {}", key), e));
            }
        };
        let bytes = result
            .bytes()
            .await
            .map_err(|e| DeltaGuardError::read_failed(format!("Failed to download {}", key), e))?;
        TableFormat::from_key(key).decode(&bytes).map(Some)
    }

    async fn save(&mut self, key: &str, data: &Recordset) -> Result<()> {
        let store = self.store()?;
        let bytes = TableFormat::from_key(key).encode(data)?;
        store
            .put(&Path::from(key), PutPayload::from(bytes))
            .await
            .map_err(|e| DeltaGuardError::write_failed(format!("Failed to put {}", key), e))?;
        Ok(())
    }
}

#[async_trait]
impl Provider for S3Provider {
    fn backend(&self) -> BackendKind {
        BackendKind::S3
    }

    /// Builds the store and lists the prefix once.
    async fn connect(&mut self) -> Result<()> {
        self.store()?;
        self.probe_read().await
    }

    async fn ping(&mut self) -> Result<()> {
        self.probe_read().await
    }

    async fn probe_read(&mut self) -> Result<()> {
        let store = self.store()?;
        let prefix = self.prefix_path();
        match store.list(prefix.as_ref()).next().await {
            None | Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(DeltaGuardError::connection_failed(
                format!("Cannot list bucket {}", self.config.require_bucket()?),
                e,
            )),
        }
    }

    async fn probe_write(&mut self) -> Result<()> {
        let store = self.store()?;
        let path = Path::from(PROBE_KEY);
        store
            .put(&path, PutPayload::from_static(b"test"))
            .await
            .map_err(|e| DeltaGuardError::write_failed("Write probe failed", e))?;
        store
            .delete(&path)
            .await
            .map_err(|e| DeltaGuardError::write_failed("Write probe cleanup failed", e))
    }

    async fn list_datasets(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.config.require_bucket()?.to_string()])
    }

    async fn list_tables(&mut self, _dataset: Option<&str>) -> Result<Vec<String>> {
        let store = self.store()?;
        let prefix = self.prefix_path();
        let mut keys = Vec::new();
        let mut listing = store.list(prefix.as_ref());
        while let Some(meta) = listing.next().await {
            let meta = meta
                .map_err(|e| DeltaGuardError::read_failed("Failed to list objects", e))?;
            keys.push(meta.location.to_string());
            if keys.len() >= MAX_LISTED_KEYS {
                break;
            }
        }
        Ok(keys)
    }

    async fn read_table(&mut self, name: &str, limit: Option<usize>) -> Result<Recordset> {
        let key = self.config.object_key(name)?;
        let data = self.load(&key).await?.ok_or_else(|| {
            DeltaGuardError::read_failed(format!("Failed to read {}", key), "object not found")
        })?;
        Ok(data.head(limit))
    }

    async fn write_table(
        &mut self,
        name: &str,
        data: &Recordset,
        mode: WriteMode,
    ) -> Result<u64> {
        if data.width() == 0 {
            tracing::warn!(table = name, "Recordset has no columns; nothing written");
            return Ok(0);
        }
        let key = self.config.object_key(name)?;
        let combined = match mode {
            WriteMode::Replace => data.clone(),
            WriteMode::Append => match self.load(&key).await? {
                Some(existing) if existing.width() > 0 => existing.concat(data.clone()),
                _ => data.clone(),
            },
        };
        self.save(&key, &combined).await?;
        tracing::info!(
            key = %key,
            rows = data.len(),
            total = combined.len(),
            %mode,
            "Object written"
        );
        Ok(data.len() as u64)
    }

    async fn delete_rows(&mut self, name: &str, predicate: Option<&str>) -> Result<u64> {
        let key = self.config.object_key(name)?;
        let Some(mut data) = self.load(&key).await? else {
            return Err(DeltaGuardError::write_failed(
                format!("Failed to delete rows from {}", key),
                "object not found",
            ));
        };
        let before = data.len();
        if before == 0 {
            return Ok(0);
        }

        match predicate.map(str::trim).filter(|p| !p.is_empty()) {
            Some(text) => {
                let predicate = Predicate::parse(text, data.columns())?;
                data.retain_rows(|row| !predicate.matches(row));
            }
            None => data.retain_rows(|_| false),
        }

        let removed = before - data.len();
        if removed > 0 {
            self.save(&key, &data).await?;
        }
        tracing::info!(key = %key, removed, "Rows deleted from object");
        Ok(removed as u64)
    }

    async fn delete_table(&mut self, name: &str) -> Result<()> {
        let key = self.config.object_key(name)?;
        let store = self.store()?;
        match store.delete(&Path::from(key.as_str())).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(DeltaGuardError::write_failed(format!("Failed to delete {}", key), e)),
        }
    }

    async fn close(&mut self) {
        if !self.injected {
            self.store = None;
        }
    }
}
