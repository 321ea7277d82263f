//! Typed access to the records under each key prefix.
//!
//! Every store call gets its own deadline; an elapsed deadline surfaces as
//! [`Error::Store`]. Malformed records in listings are skipped with a warning so
//! one bad value cannot hide the rest of the prefix.

mod deployments;
mod nodes;
mod pods;
mod services;
mod volumes;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use maden_common::{Error, ResourceKind, Result};

use crate::types::MetaStore;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// A decoded record together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: u64,
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn MetaStore>,
    timeout: Duration,
}

impl Repository {
    pub fn new(store: Arc<dyn MetaStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(Error::Store(e)),
            Err(_) => Err(Error::store(anyhow::anyhow!(
                "store call timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    async fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Versioned<T>>> {
        let Some((bytes, revision)) = self.call(self.store.get(key)).await? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes)?;
        Ok(Some(Versioned { value, revision }))
    }

    async fn list_records<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<Versioned<T>>> {
        let kvs = self.call(self.store.list_prefix(prefix)).await?;
        let mut out = Vec::with_capacity(kvs.len());
        for (key, bytes, revision) in kvs {
            match serde_json::from_slice(&bytes) {
                Ok(value) => out.push(Versioned { value, revision }),
                Err(e) => tracing::warn!(%key, error=%e, "skipping malformed record"),
            }
        }
        Ok(out)
    }

    async fn create_record<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        kind: ResourceKind,
        id: &str,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let (created, _existing) = self.call(self.store.create(key, bytes)).await?;
        if !created {
            return Err(Error::duplicate(kind, id));
        }
        Ok(())
    }

    async fn put_record<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.call(self.store.put(key, bytes)).await?;
        Ok(())
    }

    async fn update_record<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        kind: ResourceKind,
        id: &str,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        match self.call(self.store.put_if_exists(key, bytes)).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(kind, id)),
        }
    }

    async fn swap_record<T: Serialize>(&self, key: &str, value: &T, revision: u64) -> Result<bool> {
        let bytes = serde_json::to_vec(value)?;
        let (swapped, _) = self
            .call(self.store.compare_and_swap(key, revision, bytes))
            .await?;
        Ok(swapped)
    }

    async fn delete_record(&self, key: &str, kind: ResourceKind, id: &str) -> Result<()> {
        match self.call(self.store.delete(key)).await? {
            0 => Err(Error::not_found(kind, id)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::{Repository, DEFAULT_STORE_TIMEOUT};
    use crate::MemoryMetaStore;

    pub fn memory_repo() -> Repository {
        Repository::new(Arc::new(MemoryMetaStore::new()), DEFAULT_STORE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use maden_common::Error;

    use super::Repository;
    use crate::types::{MetaStore, WatchStream};
    use crate::MemoryMetaStore;

    /// Reads hang for a second; everything else goes straight to memory.
    struct SlowReads(MemoryMetaStore);

    #[async_trait]
    impl MetaStore for SlowReads {
        async fn get(&self, key: &str) -> anyhow::Result<Option<(Vec<u8>, u64)>> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.0.get(key).await
        }
        async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
            self.0.put(key, value).await
        }
        async fn put_if_exists(
            &self,
            key: &str,
            value: Vec<u8>,
        ) -> anyhow::Result<Option<Vec<u8>>> {
            self.0.put_if_exists(key, value).await
        }
        async fn delete(&self, key: &str) -> anyhow::Result<u64> {
            self.0.delete(key).await
        }
        async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>, u64)>> {
            self.0.list_prefix(prefix).await
        }
        async fn create(
            &self,
            key: &str,
            value: Vec<u8>,
        ) -> anyhow::Result<(bool, Option<Vec<u8>>)> {
            self.0.create(key, value).await
        }
        async fn compare_and_swap(
            &self,
            key: &str,
            expected_revision: u64,
            value: Vec<u8>,
        ) -> anyhow::Result<(bool, u64)> {
            self.0.compare_and_swap(key, expected_revision, value).await
        }
        async fn watch_prefix(
            &self,
            prefix: &str,
            with_prev_value: bool,
        ) -> anyhow::Result<WatchStream> {
            self.0.watch_prefix(prefix, with_prev_value).await
        }
    }

    #[tokio::test]
    async fn elapsed_deadline_is_a_store_error() {
        let repo = Repository::new(
            Arc::new(SlowReads(MemoryMetaStore::new())),
            Duration::from_millis(10),
        );
        repo.store().put("/pods/p1", b"{}".to_vec()).await.unwrap();

        let err = repo.get_pod("p1").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)), "{err:?}");
        assert!(err.to_string().contains("timed out after 10ms"), "{err}");
    }

    #[tokio::test]
    async fn calls_within_the_deadline_pass_through() {
        let repo = Repository::new(
            Arc::new(SlowReads(MemoryMetaStore::new())),
            Duration::from_millis(10),
        );
        assert!(repo.list_pods().await.unwrap().is_empty());
    }
}
