use anyhow::Result;
use etcd_client::{
    Client, Compare, CompareOp, EventType, GetOptions, KeyValue, PutOptions, Txn, TxnOp,
    TxnOpResponse, WatchOptions,
};
use tokio_stream::wrappers::ReceiverStream;

use crate::types::{MetaStore, WatchEvent, WatchEventKind, WatchStream};

/// etcd v3 backend. The client is cheap to clone; every call works on its own
/// clone so slow requests do not serialize behind each other.
#[derive(Clone)]
pub struct EtcdMetaStore {
    client: Client,
}

impl EtcdMetaStore {
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;
        Ok(Self { client })
    }

    fn key_string(kv: &KeyValue) -> String {
        String::from_utf8_lossy(kv.key()).to_string()
    }
}

#[async_trait::async_trait]
impl MetaStore for EtcdMetaStore {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>> {
        let mut cli = self.client.clone();
        let resp = cli.get(key, None).await?;
        Ok(resp
            .kvs()
            .first()
            .map(|kv| (kv.value().to_vec(), kv.mod_revision() as u64)))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut cli = self.client.clone();
        let opts = PutOptions::new().with_prev_key();
        let resp = cli.put(key, value, Some(opts)).await?;
        Ok(resp.prev_key().map(|kv| kv.value().to_vec()))
    }

    async fn put_if_exists(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let mut cli = self.client.clone();
        let cmp = Compare::version(key, CompareOp::Greater, 0);
        let put = TxnOp::put(key, value, Some(PutOptions::new().with_prev_key()));
        let txn = Txn::new().when([cmp]).and_then([put]).or_else([]);
        let resp = cli.txn(txn).await?;
        if !resp.succeeded() {
            return Ok(None);
        }
        let prev = resp.op_responses().into_iter().find_map(|op| match op {
            TxnOpResponse::Put(p) => p.prev_key().map(|kv| kv.value().to_vec()),
            _ => None,
        });
        Ok(prev)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut cli = self.client.clone();
        let resp = cli.delete(key, None).await?;
        Ok(resp.deleted().max(0) as u64)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>, u64)>> {
        let mut cli = self.client.clone();
        let opts = GetOptions::new().with_prefix();
        let resp = cli.get(prefix, Some(opts)).await?;
        Ok(resp
            .kvs()
            .iter()
            .map(|kv| {
                (
                    Self::key_string(kv),
                    kv.value().to_vec(),
                    kv.mod_revision() as u64,
                )
            })
            .collect())
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<(bool, Option<Vec<u8>>)> {
        let mut cli = self.client.clone();
        let cmp = Compare::version(key, CompareOp::Equal, 0);
        let txn = Txn::new()
            .when([cmp])
            .and_then([TxnOp::put(key, value, None)])
            .or_else([TxnOp::get(key, None)]);
        let resp = cli.txn(txn).await?;
        if resp.succeeded() {
            return Ok((true, None));
        }
        let existing = resp.op_responses().into_iter().find_map(|op| match op {
            TxnOpResponse::Get(g) => g.kvs().first().map(|kv| kv.value().to_vec()),
            _ => None,
        });
        Ok((false, existing))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_revision: u64,
        value: Vec<u8>,
    ) -> Result<(bool, u64)> {
        let mut cli = self.client.clone();
        let cmp = Compare::mod_revision(key, CompareOp::Equal, expected_revision as i64);
        let txn = Txn::new()
            .when([cmp])
            .and_then([TxnOp::put(key, value, None)])
            .or_else([TxnOp::get(key, None)]);
        let resp = cli.txn(txn).await?;

        if resp.succeeded() {
            let rev = resp.header().map(|h| h.revision()).unwrap_or_default();
            return Ok((true, rev as u64));
        }

        // failed CAS: report the current mod_revision, 0 when the key is gone
        let current = resp
            .op_responses()
            .into_iter()
            .find_map(|op| match op {
                TxnOpResponse::Get(g) => g.kvs().first().map(|kv| kv.mod_revision() as u64),
                _ => None,
            })
            .unwrap_or(0);
        Ok((false, current))
    }

    async fn watch_prefix(&self, prefix: &str, with_prev_value: bool) -> Result<WatchStream> {
        let mut cli = self.client.clone();

        let mut opts = WatchOptions::new().with_prefix();
        if with_prev_value {
            opts = opts.with_prev_key();
        }

        let (watcher, mut stream) = cli.watch(prefix, Some(opts)).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<WatchEvent>(1024);
        let prefix = prefix.to_string();
        tokio::spawn(async move {
            // the watch is cancelled server-side once the watcher is dropped
            let _watcher = watcher;
            while let Some(item) = stream.message().await.transpose() {
                let resp = match item {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error=%e, %prefix, "etcd watch stream failed");
                        return;
                    }
                };

                for ev in resp.events() {
                    let Some(kv) = ev.kv() else { continue };
                    let kind = match ev.event_type() {
                        EventType::Put => WatchEventKind::Put,
                        EventType::Delete => WatchEventKind::Delete,
                    };
                    let value = match kind {
                        WatchEventKind::Put => Some(kv.value().to_vec()),
                        WatchEventKind::Delete => None,
                    };
                    let event = WatchEvent {
                        kind,
                        key: Self::key_string(kv),
                        value,
                        prev_value: ev.prev_kv().map(|p| p.value().to_vec()),
                        revision: kv.mod_revision() as u64,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
