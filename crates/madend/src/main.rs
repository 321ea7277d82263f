mod args;
mod http;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use maden_common::telemetry::{init_tracing, TelemetryConfig};
use maden_common::{Error, Node, NodeStatus, Resources};
use maden_controller::{
    apply_manifests, parse_manifests, ChangeListener, ControlPlaneMetrics, DeploymentController,
    DeploymentUpdaterController, PodOrchestrator, PodUpdaterController, ServiceController,
    ServiceUpdaterController, VolumeController,
};
use maden_meta::{EtcdMetaStore, MemoryMetaStore, MetaStore, Repository};
use maden_node::{ContainerRuntime, DockerCliRuntime, MemoryRuntime, PodLifecycleManager};
use maden_scheduler::Scheduler;

use crate::args::{Args, RuntimeKind, StoreKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let telemetry = init_tracing(&TelemetryConfig {
        service_name: "madend".into(),
        otlp_endpoint: args.otlp_endpoint.clone(),
        otlp_token: args.otlp_token.clone(),
    });
    info!(store=?args.store, runtime=?args.runtime, node_id=%args.node_id, "madend starting");

    let store: Arc<dyn MetaStore> = match args.store {
        StoreKind::Memory => Arc::new(MemoryMetaStore::new()),
        StoreKind::Etcd => {
            let etcd = EtcdMetaStore::connect(std::slice::from_ref(&args.etcd_endpoint))
                .await
                .with_context(|| format!("connecting to etcd at {}", args.etcd_endpoint))?;
            info!(endpoint=%args.etcd_endpoint, "connected to etcd");
            Arc::new(etcd)
        }
    };
    let runtime: Arc<dyn ContainerRuntime> = match args.runtime {
        RuntimeKind::Docker => Arc::new(DockerCliRuntime::default()),
        RuntimeKind::Memory => Arc::new(MemoryRuntime::new()),
    };

    let repo = Repository::new(store.clone(), args.store_timeout());
    register_node(&repo, &args).await?;

    // ---- wiring ----
    let metrics = Arc::new(ControlPlaneMetrics::default());
    let manager = Arc::new(PodLifecycleManager::new(runtime, repo.clone()));
    let orchestrator = Arc::new(PodOrchestrator::new(
        repo.clone(),
        Scheduler::new(repo.clone()),
        manager.clone(),
        metrics.clone(),
    ));
    let deployment_updater = Arc::new(DeploymentUpdaterController::new(
        repo.clone(),
        orchestrator,
    ));
    let deployments = DeploymentController::new(repo.clone(), deployment_updater.clone());
    let services = ServiceController::new(repo.clone());
    let volumes = VolumeController::new(repo.clone());

    let cancel = CancellationToken::new();
    let listener = ChangeListener::new(
        store,
        deployment_updater,
        Arc::new(ServiceUpdaterController),
        Arc::new(PodUpdaterController::new(manager, metrics.clone())),
        metrics.clone(),
    )
    .start(cancel.clone())
    .await?;

    // ---- manifests ----
    for path in &args.manifests {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let manifests = parse_manifests(&bytes)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        apply_manifests(manifests, &deployments, &services, &volumes)
            .await
            .with_context(|| format!("applying manifest {}", path.display()))?;
    }

    // ---- http ----
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.metrics_port));
    let tcp = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving /metrics and /healthz");
    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move { server_cancel.cancelled().await };
        if let Err(e) = axum::serve(tcp, http::router(metrics))
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error=%e, "metrics server exited");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    cancel.cancel();
    listener.join().await;
    if let Err(e) = server.await {
        warn!(error=%e, "metrics server task failed");
    }
    telemetry.shutdown();
    Ok(())
}

/// Record this node, or refresh its capacity, labels and taints while keeping
/// the resources already reserved on it.
async fn register_node(repo: &Repository, args: &Args) -> anyhow::Result<()> {
    let node = Node {
        id: args.node_id.clone(),
        name: args.node_name(),
        status: NodeStatus::Ready,
        capacity: Resources::new(args.node_cpu, args.node_memory),
        used: Resources::default(),
        labels: args.labels(),
        taints: args.taints(),
    };

    match repo.create_node(&node).await {
        Ok(()) => {
            info!(node_id=%node.id, cpu=node.capacity.cpu, memory=node.capacity.memory, "node registered");
            return Ok(());
        }
        Err(Error::Duplicate { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    let current = repo.get_node(&node.id).await?;
    let refreshed = Node {
        used: current.value.used,
        ..node
    };
    if repo.swap_node(&refreshed, current.revision).await? {
        info!(node_id=%refreshed.id, "node registration refreshed");
    } else {
        warn!(node_id=%refreshed.id, "node changed during registration, keeping stored record");
    }
    Ok(())
}
