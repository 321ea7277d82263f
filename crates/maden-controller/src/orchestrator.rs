use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use maden_common::{Pod, PodStatus, Result};
use maden_meta::Repository;
use maden_node::{LogStream, PodManager};
use maden_scheduler::Scheduler;

use crate::metrics::ControlPlaneMetrics;

/// Pod create/delete entry points used by the deployment reconciler.
#[async_trait]
pub trait PodOrchestration: Send + Sync {
    /// Schedule and persist `pod`, then start its containers in the background.
    /// Returns the pod as persisted.
    async fn create_pod(&self, pod: Pod) -> Result<Pod>;

    /// Tear down the pod's containers (best effort) and remove its record.
    async fn delete_pod(&self, pod: &Pod) -> Result<()>;
}

pub struct PodOrchestrator {
    repo: Repository,
    scheduler: Scheduler,
    manager: Arc<dyn PodManager>,
    metrics: Arc<ControlPlaneMetrics>,
}

impl PodOrchestrator {
    pub fn new(
        repo: Repository,
        scheduler: Scheduler,
        manager: Arc<dyn PodManager>,
        metrics: Arc<ControlPlaneMetrics>,
    ) -> Self {
        Self {
            repo,
            scheduler,
            manager,
            metrics,
        }
    }

    pub async fn delete_pod_by_id(&self, pod_id: &str) -> Result<()> {
        let pod = self.repo.get_pod(pod_id).await?;
        self.delete_pod(&pod).await
    }

    pub async fn get_pod_logs(
        &self,
        pod_id: &str,
        container: Option<&str>,
        follow: bool,
    ) -> Result<LogStream> {
        let pod = self.repo.get_pod(pod_id).await?;
        self.manager.container_logs(&pod, container, follow).await
    }

    pub async fn execute_command(
        &self,
        pod_id: &str,
        container: Option<&str>,
        command: &str,
    ) -> Result<String> {
        let pod = self.repo.get_pod(pod_id).await?;
        self.manager.exec(&pod, container, command).await
    }
}

#[async_trait]
impl PodOrchestration for PodOrchestrator {
    async fn create_pod(&self, mut pod: Pod) -> Result<Pod> {
        self.scheduler.schedule_pod(&mut pod).await?;
        if let Err(e) = self.repo.create_pod(&pod).await {
            // The node reservation must not outlive a pod that was never recorded.
            if pod.status == PodStatus::Scheduled {
                if let Err(release_err) = self.scheduler.release_pod(&pod).await {
                    warn!(pod_id=%pod.id, error=%release_err, "failed to release resources of unrecorded pod");
                }
            }
            return Err(e);
        }
        ControlPlaneMetrics::inc(&self.metrics.pods_created_total);

        if pod.status != PodStatus::Scheduled {
            ControlPlaneMetrics::inc(&self.metrics.pods_pending_total);
            info!(pod_id=%pod.id, name=%pod.name, "pod recorded as pending");
            return Ok(pod);
        }

        let manager = self.manager.clone();
        let started = pod.clone();
        tokio::spawn(async move {
            let pod_id = started.id.clone();
            match manager.run_pod(started).await {
                Ok(p) => debug!(%pod_id, status=?p.status, "pod startup finished"),
                Err(e) => error!(%pod_id, error=%e, "pod startup aborted"),
            }
        });

        info!(pod_id=%pod.id, name=%pod.name, node_id=%pod.node_id, "pod created");
        Ok(pod)
    }

    async fn delete_pod(&self, pod: &Pod) -> Result<()> {
        if let Err(e) = self.manager.stop_pod(pod).await {
            warn!(pod_id=%pod.id, error=%e, "container cleanup failed, removing record anyway");
        }

        match self.repo.delete_pod(&pod.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(pod_id=%pod.id, "pod record already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        ControlPlaneMetrics::inc(&self.metrics.pods_deleted_total);

        self.scheduler.release_pod(pod).await?;
        info!(pod_id=%pod.id, name=%pod.name, "pod deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use maden_common::{Error, Resources};
    use maden_node::{ContainerState, MemoryRuntime, PodLifecycleManager};

    use super::*;
    use crate::testing::{memory_repo, pod_with_images, ready_node};

    struct Fixture {
        repo: Repository,
        runtime: MemoryRuntime,
        metrics: Arc<ControlPlaneMetrics>,
        orchestrator: PodOrchestrator,
    }

    fn fixture() -> Fixture {
        let repo = memory_repo();
        let runtime = MemoryRuntime::new();
        let metrics = Arc::new(ControlPlaneMetrics::default());
        let manager = PodLifecycleManager::new(Arc::new(runtime.clone()), repo.clone());
        let orchestrator = PodOrchestrator::new(
            repo.clone(),
            Scheduler::new(repo.clone()),
            Arc::new(manager),
            metrics.clone(),
        );
        Fixture {
            repo,
            runtime,
            metrics,
            orchestrator,
        }
    }

    async fn wait_for(repo: &Repository, pod_id: &str, done: impl Fn(&Pod) -> bool) -> Pod {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(p) = repo.get_pod(pod_id).await {
                    if done(&p) {
                        return p;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }

    async fn wait_for_status(repo: &Repository, pod_id: &str, status: PodStatus) -> Pod {
        wait_for(repo, pod_id, |p| p.status == status).await
    }

    #[tokio::test]
    async fn create_schedules_persists_and_starts() {
        let f = fixture();
        f.repo.create_node(&ready_node("n1", 4, 1024)).await.unwrap();

        let created = f
            .orchestrator
            .create_pod(pod_with_images("p1", &["nginx"]))
            .await
            .unwrap();
        assert_eq!(created.status, PodStatus::Scheduled);
        assert_eq!(created.node_id, "n1");

        let running = wait_for_status(&f.repo, "p1", PodStatus::Running).await;
        let id = running.containers[0].container_id.as_deref().unwrap();
        assert_eq!(f.runtime.state_of(id), Some(ContainerState::Running));
        assert_eq!(f.metrics.pods_created_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn unplaceable_pod_is_recorded_pending_without_containers() {
        let f = fixture();
        let created = f
            .orchestrator
            .create_pod(pod_with_images("p1", &["nginx"]))
            .await
            .unwrap();

        assert_eq!(created.status, PodStatus::Pending);
        assert_eq!(f.repo.get_pod("p1").await.unwrap().status, PodStatus::Pending);
        assert_eq!(f.runtime.container_count(), 0);
        assert_eq!(f.metrics.pods_pending_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn duplicate_pod_releases_its_reservation() {
        let f = fixture();
        f.repo.create_node(&ready_node("n1", 4, 1024)).await.unwrap();
        f.repo.create_pod(&pod_with_images("p1", &["nginx"])).await.unwrap();

        let err = f
            .orchestrator
            .create_pod(pod_with_images("p1", &["nginx"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
        assert_eq!(
            f.repo.get_node("n1").await.unwrap().value.used,
            Resources::default()
        );
    }

    #[tokio::test]
    async fn container_failure_after_hand_off_is_only_visible_in_status() {
        let f = fixture();
        f.repo.create_node(&ready_node("n1", 4, 1024)).await.unwrap();
        f.runtime.fail_create_for("broken");

        let created = f
            .orchestrator
            .create_pod(pod_with_images("p1", &["broken"]))
            .await;
        assert!(created.is_ok());
        wait_for_status(&f.repo, "p1", PodStatus::Failed).await;
    }

    #[tokio::test]
    async fn delete_removes_record_and_releases_node() {
        let f = fixture();
        f.repo.create_node(&ready_node("n1", 4, 1024)).await.unwrap();
        f.orchestrator
            .create_pod(pod_with_images("p1", &["nginx"]))
            .await
            .unwrap();
        let running = wait_for_status(&f.repo, "p1", PodStatus::Running).await;

        f.orchestrator.delete_pod_by_id("p1").await.unwrap();

        assert!(f.repo.get_pod("p1").await.unwrap_err().is_not_found());
        assert_eq!(
            f.repo.get_node("n1").await.unwrap().value.used,
            Resources::default()
        );
        let id = running.containers[0].container_id.as_deref().unwrap();
        assert_eq!(f.runtime.state_of(id), None);
        assert_eq!(f.metrics.pods_deleted_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn record_is_removed_even_when_containers_cannot_be_cleaned() {
        let f = fixture();
        let mut p = pod_with_images("p1", &["nginx"]);
        p.containers[0].container_id = Some("does-not-exist".into());
        f.repo.create_pod(&p).await.unwrap();

        f.orchestrator.delete_pod(&p).await.unwrap();
        assert!(f.repo.get_pod("p1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn logs_and_exec_resolve_containers() {
        let f = fixture();
        f.repo.create_node(&ready_node("n1", 4, 1024)).await.unwrap();
        f.orchestrator
            .create_pod(pod_with_images("p1", &["nginx", "redis"]))
            .await
            .unwrap();
        let running = wait_for(&f.repo, "p1", |p| {
            p.status == PodStatus::Running && p.containers.iter().all(|c| c.container_id.is_some())
        })
        .await;

        assert!(matches!(
            f.orchestrator.get_pod_logs("p1", None, false).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            f.orchestrator.execute_command("p1", Some("nope"), "ls").await,
            Err(Error::NotFound { .. })
        ));

        let target = running.containers[1].container_id.clone().unwrap();
        let out = f
            .orchestrator
            .execute_command("p1", Some(&target), "uptime")
            .await
            .unwrap();
        assert_eq!(out, "uptime\n");
    }
}
