use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::types::{MetaStore, WatchEvent, WatchEventKind, WatchStream};

/// In-process store with the same semantics as the etcd backend. Used for
/// single-process runs and tests.
#[derive(Debug, Clone)]
pub struct MemoryMetaStore {
    inner: Arc<RwLock<Inner>>,
    tx: broadcast::Sender<WatchEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    revision: u64,
    kv: BTreeMap<String, (Vec<u8>, u64)>,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision = self.revision.saturating_add(1);
        self.revision
    }

    fn write(&mut self, key: &str, value: Vec<u8>) -> (u64, Option<Vec<u8>>) {
        let rev = self.next_revision();
        let prev = self
            .kv
            .insert(key.to_string(), (value, rev))
            .map(|(v, _)| v);
        (rev, prev)
    }
}

/// Events buffered per watcher before it is considered lagged.
const WATCH_CAPACITY: usize = 4096;

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::with_watch_capacity(WATCH_CAPACITY)
    }

    /// A watcher that falls more than `capacity` events behind has its stream
    /// ended, so the consumer resubscribes.
    pub fn with_watch_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            tx,
        }
    }

    // Called with the write lock held so subscribers see events in revision order.
    fn emit_put(&self, key: &str, value: &[u8], prev: Option<Vec<u8>>, revision: u64) {
        let _ = self.tx.send(WatchEvent {
            kind: WatchEventKind::Put,
            key: key.to_string(),
            value: Some(value.to_vec()),
            prev_value: prev,
            revision,
        });
    }
}

impl Default for MemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MetaStore for MemoryMetaStore {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>> {
        let inner = self.inner.read().await;
        Ok(inner.kv.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write().await;
        let (rev, prev) = inner.write(key, value.clone());
        self.emit_put(key, &value, prev.clone(), rev);
        Ok(prev)
    }

    async fn put_if_exists(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write().await;
        if !inner.kv.contains_key(key) {
            return Ok(None);
        }
        let (rev, prev) = inner.write(key, value.clone());
        self.emit_put(key, &value, prev.clone(), rev);
        Ok(prev)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some((prev, _)) = inner.kv.remove(key) else {
            return Ok(0);
        };
        let rev = inner.next_revision();
        let _ = self.tx.send(WatchEvent {
            kind: WatchEventKind::Delete,
            key: key.to_string(),
            value: None,
            prev_value: Some(prev),
            revision: rev,
        });
        Ok(1)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>, u64)>> {
        let inner = self.inner.read().await;
        let out = inner
            .kv
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, (v, rev))| (k.clone(), v.clone(), *rev))
            .collect();
        Ok(out)
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<(bool, Option<Vec<u8>>)> {
        let mut inner = self.inner.write().await;
        if let Some((existing, _)) = inner.kv.get(key) {
            return Ok((false, Some(existing.clone())));
        }
        let (rev, _) = inner.write(key, value.clone());
        self.emit_put(key, &value, None, rev);
        Ok((true, None))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_revision: u64,
        value: Vec<u8>,
    ) -> Result<(bool, u64)> {
        let mut inner = self.inner.write().await;
        let current_rev = inner.kv.get(key).map(|(_, rev)| *rev).unwrap_or(0);
        if current_rev != expected_revision {
            return Ok((false, current_rev));
        }
        let (rev, prev) = inner.write(key, value.clone());
        self.emit_put(key, &value, prev, rev);
        Ok((true, rev))
    }

    async fn watch_prefix(&self, prefix: &str, with_prev_value: bool) -> Result<WatchStream> {
        let prefix = prefix.to_string();
        let rx = self.tx.subscribe();
        let lag_prefix = prefix.clone();
        let stream = BroadcastStream::new(rx)
            .take_while(move |msg| match msg {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(error=%e, prefix=%lag_prefix, "watch subscriber lagged, ending stream");
                    false
                }
            })
            .filter_map(move |msg| match msg {
                Ok(mut ev) if ev.key.starts_with(&prefix) => {
                    if !with_prev_value {
                        ev.prev_value = None;
                    }
                    Some(ev)
                }
                _ => None,
            });

        Ok(Box::pin(stream))
    }
}
