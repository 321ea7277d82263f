//! Watch loops over the deployment, service and pod prefixes.
//!
//! Each prefix has its own task consuming events strictly in order; a slow
//! handler only delays its own prefix. Handler failures are logged and counted,
//! never fatal to the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use maden_common::keys::{DEPLOYMENTS_PREFIX, PODS_PREFIX, SERVICES_PREFIX};
use maden_common::{Deployment, Pod, Result, Service};
use maden_meta::{MetaStore, WatchEvent, WatchEventKind, WatchStream};

use crate::metrics::ControlPlaneMetrics;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A typed record lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Created(T),
    Updated { old: T, new: T },
    Deleted(T),
}

impl<T: DeserializeOwned> Change<T> {
    /// Classify a raw watch event. A put without a previous value is a create.
    /// Returns `None` for events that carry nothing to decode.
    pub fn from_event(event: &WatchEvent) -> Result<Option<Self>> {
        match event.kind {
            WatchEventKind::Put => {
                let Some(value) = event.value.as_deref() else {
                    return Ok(None);
                };
                let new = serde_json::from_slice(value)?;
                match event.prev_value.as_deref() {
                    Some(prev) => Ok(Some(Change::Updated {
                        old: serde_json::from_slice(prev)?,
                        new,
                    })),
                    None => Ok(Some(Change::Created(new))),
                }
            }
            WatchEventKind::Delete => match event.prev_value.as_deref() {
                Some(prev) => Ok(Some(Change::Deleted(serde_json::from_slice(prev)?))),
                None => Ok(None),
            },
        }
    }
}

#[async_trait]
pub trait ResourceHandler<T>: Send + Sync {
    async fn handle(&self, change: Change<T>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    All,
    UpdatesOnly,
}

pub struct ChangeListener {
    store: Arc<dyn MetaStore>,
    deployments: Arc<dyn ResourceHandler<Deployment>>,
    services: Arc<dyn ResourceHandler<Service>>,
    pods: Arc<dyn ResourceHandler<Pod>>,
    metrics: Arc<ControlPlaneMetrics>,
    retry_delay: Duration,
}

/// Running watch loops. They stop when the token passed to
/// [`ChangeListener::start`] is cancelled.
pub struct ListenerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerHandle {
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error=%e, "watch loop task failed");
            }
        }
    }
}

impl ChangeListener {
    pub fn new(
        store: Arc<dyn MetaStore>,
        deployments: Arc<dyn ResourceHandler<Deployment>>,
        services: Arc<dyn ResourceHandler<Service>>,
        pods: Arc<dyn ResourceHandler<Pod>>,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        Self {
            store,
            deployments,
            services,
            pods,
            metrics,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Subscribe to all three prefixes, then spawn one loop per prefix. Events
    /// written after this returns are guaranteed to be observed.
    pub async fn start(self, cancel: CancellationToken) -> anyhow::Result<ListenerHandle> {
        let deployments = WatchLoop {
            store: self.store.clone(),
            prefix: DEPLOYMENTS_PREFIX,
            forward: Forward::All,
            handler: self.deployments,
            metrics: self.metrics.clone(),
            retry_delay: self.retry_delay,
        };
        let services = WatchLoop {
            store: self.store.clone(),
            prefix: SERVICES_PREFIX,
            forward: Forward::All,
            handler: self.services,
            metrics: self.metrics.clone(),
            retry_delay: self.retry_delay,
        };
        // Pod creation is driven by the deployment reconciler, not by this watch.
        let pods = WatchLoop {
            store: self.store,
            prefix: PODS_PREFIX,
            forward: Forward::UpdatesOnly,
            handler: self.pods,
            metrics: self.metrics,
            retry_delay: self.retry_delay,
        };

        let deployment_stream = deployments.subscribe().await?;
        let service_stream = services.subscribe().await?;
        let pod_stream = pods.subscribe().await?;

        let tasks = vec![
            tokio::spawn(deployments.run(deployment_stream, cancel.clone())),
            tokio::spawn(services.run(service_stream, cancel.clone())),
            tokio::spawn(pods.run(pod_stream, cancel)),
        ];
        info!("watching deployments, services and pods");
        Ok(ListenerHandle { tasks })
    }
}

struct WatchLoop<T> {
    store: Arc<dyn MetaStore>,
    prefix: &'static str,
    forward: Forward,
    handler: Arc<dyn ResourceHandler<T>>,
    metrics: Arc<ControlPlaneMetrics>,
    retry_delay: Duration,
}

impl<T> WatchLoop<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn subscribe(&self) -> anyhow::Result<WatchStream> {
        self.store.watch_prefix(self.prefix, true).await
    }

    /// Returns false when cancelled during the pause.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }

    async fn run(self, initial: WatchStream, cancel: CancellationToken) {
        let mut pending = Some(initial);
        loop {
            let mut stream = match pending.take() {
                Some(s) => s,
                None => {
                    ControlPlaneMetrics::inc(&self.metrics.watch_reconnects_total);
                    let subscribed = tokio::select! {
                        _ = cancel.cancelled() => break,
                        r = self.subscribe() => r,
                    };
                    match subscribed {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(prefix=%self.prefix, error=%e, "failed to watch prefix, will retry");
                            if !self.pause(&cancel).await {
                                break;
                            }
                            continue;
                        }
                    }
                }
            };

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(prefix=%self.prefix, "watch loop cancelled");
                        return;
                    }
                    ev = stream.next() => ev,
                };
                let Some(event) = next else { break };
                self.dispatch(event).await;
            }

            warn!(prefix=%self.prefix, "watch stream ended, reconnecting");
            if !self.pause(&cancel).await {
                break;
            }
        }
        debug!(prefix=%self.prefix, "watch loop stopped");
    }

    async fn dispatch(&self, event: WatchEvent) {
        ControlPlaneMetrics::inc(&self.metrics.watch_events_total);

        let change = match Change::<T>::from_event(&event) {
            Ok(Some(c)) => c,
            Ok(None) => {
                debug!(prefix=%self.prefix, key=%event.key, kind=?event.kind, "event without a usable value");
                return;
            }
            Err(e) => {
                ControlPlaneMetrics::inc(&self.metrics.watch_errors_total);
                warn!(prefix=%self.prefix, key=%event.key, error=%e, "failed to decode watch event");
                return;
            }
        };

        if self.forward == Forward::UpdatesOnly && !matches!(change, Change::Updated { .. }) {
            return;
        }

        if let Err(e) = self.handler.handle(change).await {
            ControlPlaneMetrics::inc(&self.metrics.watch_errors_total);
            error!(prefix=%self.prefix, key=%event.key, error=%e, "watch handler failed");
        }
    }
}
