use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use maden_common::{Error, Pod, PodStatus, Result};
use maden_meta::Repository;

use crate::runtime::{ContainerRuntime, ContainerState, LogStream};

/// Node-side pod operations the control plane depends on.
#[async_trait]
pub trait PodManager: Send + Sync {
    /// Create and start the pod's containers in declared order, persisting every
    /// status step. Container failures end up in the returned pod's status;
    /// only store failures are errors.
    async fn run_pod(&self, pod: Pod) -> Result<Pod>;

    /// Stop and remove the pod's running containers. Individual failures are
    /// logged, not returned.
    async fn stop_pod(&self, pod: &Pod) -> Result<()>;

    async fn container_logs(
        &self,
        pod: &Pod,
        container: Option<&str>,
        follow: bool,
    ) -> Result<LogStream>;

    async fn exec(&self, pod: &Pod, container: Option<&str>, command: &str) -> Result<String>;
}

/// Drives each pod's container state machine against a [`ContainerRuntime`].
#[derive(Clone)]
pub struct PodLifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    repo: Repository,
}

impl PodLifecycleManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, repo: Repository) -> Self {
        Self { runtime, repo }
    }

    async fn mark_failed(&self, pod: &mut Pod) -> Result<()> {
        pod.status = PodStatus::Failed;
        self.persist_step(pod).await
    }

    /// Stop (if running) and remove a container the pod no longer owns.
    async fn discard_container(&self, pod_id: &str, container_id: &str) {
        match self.runtime.container_status(container_id).await {
            Ok(ContainerState::Running) => {
                if let Err(e) = self.runtime.stop_container(container_id).await {
                    warn!(%pod_id, %container_id, error=%e, "failed to stop discarded container");
                }
            }
            Ok(_) => {}
            // Already gone.
            Err(_) => return,
        }
        if let Err(e) = self.runtime.delete_container(container_id).await {
            warn!(%pod_id, %container_id, error=%e, "failed to remove discarded container");
        }
    }

    /// Persist a startup step. If the pod record has been deleted meanwhile,
    /// every container already created for it is torn down before the
    /// NotFound is returned.
    async fn persist_step(&self, pod: &Pod) -> Result<()> {
        match self.repo.update_pod(pod).await {
            Err(e) if e.is_not_found() => {
                for id in pod.containers.iter().filter_map(|c| c.container_id.as_deref()) {
                    warn!(pod_id=%pod.id, container_id=%id, "pod deleted during startup, removing container");
                    self.discard_container(&pod.id, id).await;
                }
                Err(e)
            }
            other => other,
        }
    }
}

#[async_trait]
impl PodManager for PodLifecycleManager {
    async fn run_pod(&self, mut pod: Pod) -> Result<Pod> {
        info!(pod_id=%pod.id, node_id=%pod.node_id, containers=pod.containers.len(), "starting pod");

        for idx in 0..pod.containers.len() {
            if let Some(stale) = pod.containers[idx].container_id.take() {
                self.discard_container(&pod.id, &stale).await;
            }

            pod.status = PodStatus::ContainerCreating;
            self.persist_step(&pod).await?;

            let image = pod.containers[idx].image.clone();
            let container_id = match self.runtime.create_container(&image).await {
                Ok(id) => id,
                Err(e) => {
                    error!(pod_id=%pod.id, %image, error=%e, "failed to create container");
                    self.mark_failed(&mut pod).await?;
                    return Ok(pod);
                }
            };

            pod.containers[idx].container_id = Some(container_id.clone());
            self.persist_step(&pod).await?;

            if let Err(e) = self.runtime.start_container(&container_id).await {
                error!(pod_id=%pod.id, %container_id, error=%e, "failed to start container");
                self.mark_failed(&mut pod).await?;
                return Ok(pod);
            }

            pod.status = PodStatus::Running;
            self.persist_step(&pod).await?;
            debug!(pod_id=%pod.id, %container_id, %image, "container running");
        }

        Ok(pod)
    }

    async fn stop_pod(&self, pod: &Pod) -> Result<()> {
        for container in &pod.containers {
            let Some(id) = container.container_id.as_deref() else {
                continue;
            };
            let state = match self.runtime.container_status(id).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(pod_id=%pod.id, container_id=%id, error=%e, "failed to inspect container");
                    continue;
                }
            };
            if state != ContainerState::Running {
                debug!(pod_id=%pod.id, container_id=%id, %state, "container not running, leaving it");
                continue;
            }

            if let Err(e) = self.runtime.stop_container(id).await {
                warn!(pod_id=%pod.id, container_id=%id, error=%e, "failed to stop container");
            }
            if let Err(e) = self.runtime.delete_container(id).await {
                warn!(pod_id=%pod.id, container_id=%id, error=%e, "failed to remove container");
            }
        }
        Ok(())
    }

    async fn container_logs(
        &self,
        pod: &Pod,
        container: Option<&str>,
        follow: bool,
    ) -> Result<LogStream> {
        let id = pod.runtime_container_id(container)?;
        self.runtime
            .container_logs(&id, follow)
            .await
            .map_err(Error::runtime)
    }

    async fn exec(&self, pod: &Pod, container: Option<&str>, command: &str) -> Result<String> {
        let id = pod.runtime_container_id(container)?;
        self.runtime.exec(&id, command).await.map_err(Error::runtime)
    }
}
