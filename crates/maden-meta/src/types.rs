use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    /// New value; `None` for deletes.
    pub value: Option<Vec<u8>>,
    /// Value before this event. Only filled when the watch asked for it and the
    /// key existed before.
    pub prev_value: Option<Vec<u8>>,
    pub revision: u64,
}

pub type WatchStream = Pin<Box<dyn Stream<Item = WatchEvent> + Send>>;

/// Ordered key-value store with conditional writes and prefix watches.
///
/// Revisions are per-key modification revisions; `0` means "absent".
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>>;

    /// Unconditional write. Returns the previous value, if any.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>>;

    /// Write only when the key already exists. Returns the previous value, or
    /// `None` when nothing was written.
    async fn put_if_exists(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>>;

    /// Returns the number of keys removed.
    async fn delete(&self, key: &str) -> Result<u64>;

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>, u64)>>;

    /// Write only when the key's version is zero. On conflict nothing is written
    /// and the existing value is returned.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<(bool, Option<Vec<u8>>)>;

    /// Write only when the key's modification revision equals `expected_revision`.
    /// Returns whether the write happened and the key's revision afterwards.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_revision: u64,
        value: Vec<u8>,
    ) -> Result<(bool, u64)>;

    async fn watch_prefix(&self, prefix: &str, with_prev_value: bool) -> Result<WatchStream>;
}
