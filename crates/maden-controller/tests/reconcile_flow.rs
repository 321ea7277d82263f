//! Spec in, running containers out: the full control loop on in-memory backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use maden_common::{
    Container, DeploymentSpec, LabelSelector, Metadata, Node, NodeStatus, Pod, PodSpec, PodStatus,
    PodTemplate, Resources, RestartPolicy,
};
use maden_controller::{
    ChangeListener, ControlPlaneMetrics, DeploymentController, DeploymentUpdaterController,
    PodOrchestrator, PodUpdaterController, ServiceUpdaterController,
};
use maden_meta::{MemoryMetaStore, MetaStore, Repository, DEFAULT_STORE_TIMEOUT};
use maden_node::{ContainerState, MemoryRuntime, PodLifecycleManager};
use maden_scheduler::Scheduler;
use tokio_util::sync::CancellationToken;

struct Cluster {
    repo: Repository,
    runtime: MemoryRuntime,
    deployments: DeploymentController,
    cancel: CancellationToken,
}

async fn cluster() -> Cluster {
    let store: Arc<dyn MetaStore> = Arc::new(MemoryMetaStore::new());
    let repo = Repository::new(store.clone(), DEFAULT_STORE_TIMEOUT);
    repo.create_node(&Node {
        id: "n1".into(),
        name: "worker-1".into(),
        status: NodeStatus::Ready,
        capacity: Resources::new(8, 4096),
        used: Resources::default(),
        labels: HashMap::new(),
        taints: HashMap::new(),
    })
    .await
    .unwrap();

    let runtime = MemoryRuntime::new();
    let metrics = Arc::new(ControlPlaneMetrics::default());
    let manager = Arc::new(PodLifecycleManager::new(
        Arc::new(runtime.clone()),
        repo.clone(),
    ));
    let orchestrator = Arc::new(PodOrchestrator::new(
        repo.clone(),
        Scheduler::new(repo.clone()),
        manager.clone(),
        metrics.clone(),
    ));
    let updater = Arc::new(DeploymentUpdaterController::new(
        repo.clone(),
        orchestrator,
    ));
    let deployments = DeploymentController::new(repo.clone(), updater.clone());

    let cancel = CancellationToken::new();
    ChangeListener::new(
        store,
        updater,
        Arc::new(ServiceUpdaterController),
        Arc::new(PodUpdaterController::new(manager, metrics.clone())),
        metrics,
    )
    .with_retry_delay(Duration::from_millis(50))
    .start(cancel.clone())
    .await
    .unwrap();

    Cluster {
        repo,
        runtime,
        deployments,
        cancel,
    }
}

fn spec(replicas: u32) -> DeploymentSpec {
    DeploymentSpec {
        name: "web".into(),
        replicas,
        selector: LabelSelector {
            match_labels: HashMap::from([("app".to_string(), "web".to_string())]),
        },
        template: PodTemplate {
            metadata: Metadata {
                labels: HashMap::from([("app".to_string(), "web".to_string())]),
            },
            spec: PodSpec {
                containers: vec![Container::new("nginx:1.27")],
                resources: Resources::new(1, 256),
                restart_policy: RestartPolicy::Always,
                ..Default::default()
            },
        },
    }
}

fn fully_running(pods: &[Pod]) -> bool {
    pods.iter().all(|p| {
        p.status == PodStatus::Running && p.containers.iter().all(|c| c.container_id.is_some())
    })
}

/// Poll the deployment's pods until `done` holds.
async fn wait_for_pods(
    repo: &Repository,
    deployment_id: &str,
    done: impl Fn(&[Pod]) -> bool,
) -> Vec<Pod> {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let pods = repo.pods_by_deployment(deployment_id).await.unwrap();
            if done(&pods) {
                return pods;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("cluster did not converge")
}

#[tokio::test]
async fn deployment_lifecycle_converges() {
    let c = cluster().await;

    let d = c.deployments.handle_incoming_deployment(spec(3)).await.unwrap();
    let pods = wait_for_pods(&c.repo, &d.id, |p| p.len() == 3 && fully_running(p)).await;
    for p in &pods {
        assert_eq!(p.node_id, "n1");
        let id = p.containers[0].container_id.as_deref().unwrap();
        assert_eq!(c.runtime.state_of(id), Some(ContainerState::Running));
    }
    assert_eq!(
        c.repo.get_node("n1").await.unwrap().value.used,
        Resources::new(3, 768)
    );

    c.deployments.scale_deployment("web", 1).await.unwrap();
    wait_for_pods(&c.repo, &d.id, |p| p.len() == 1).await;
    assert_eq!(
        c.repo.get_node("n1").await.unwrap().value.used,
        Resources::new(1, 256)
    );

    c.deployments.delete_deployment("web").await.unwrap();
    wait_for_pods(&c.repo, &d.id, |p| p.is_empty()).await;
    assert_eq!(
        c.repo.get_node("n1").await.unwrap().value.used,
        Resources::default()
    );
    assert_eq!(c.runtime.container_count(), 0);

    c.cancel.cancel();
}

#[tokio::test]
async fn failed_pod_is_restarted_in_place() {
    let c = cluster().await;

    let d = c.deployments.handle_incoming_deployment(spec(1)).await.unwrap();
    let pods = wait_for_pods(&c.repo, &d.id, |p| p.len() == 1 && fully_running(p)).await;
    let mut pod = pods[0].clone();
    let first_container = pod.containers[0].container_id.clone().unwrap();

    c.runtime.set_state(&first_container, ContainerState::Dead);
    pod.status = PodStatus::Failed;
    c.repo.update_pod(&pod).await.unwrap();

    let restarted = wait_for_pods(&c.repo, &d.id, |p| {
        fully_running(p) && p[0].containers[0].container_id.as_deref() != Some(&first_container)
    })
    .await;
    assert_eq!(restarted[0].id, pod.id);
    assert_eq!(restarted[0].node_id, "n1");

    c.cancel.cancel();
}

#[tokio::test]
async fn template_change_rolls_every_pod() {
    let c = cluster().await;

    let d = c.deployments.handle_incoming_deployment(spec(2)).await.unwrap();
    let before = wait_for_pods(&c.repo, &d.id, |p| p.len() == 2 && fully_running(p)).await;

    let mut next = spec(2);
    next.template.spec.containers = vec![Container::new("nginx:1.28")];
    c.deployments.handle_incoming_deployment(next).await.unwrap();

    let after = wait_for_pods(&c.repo, &d.id, |p| {
        p.len() == 2
            && fully_running(p)
            && p.iter().all(|pod| pod.containers[0].image == "nginx:1.28")
    })
    .await;
    assert!(after.iter().all(|p| before.iter().all(|b| b.id != p.id)));

    c.cancel.cancel();
}
