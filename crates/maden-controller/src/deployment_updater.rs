use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use maden_common::{Deployment, Result};
use maden_meta::Repository;

use crate::listener::{Change, ResourceHandler};
use crate::orchestrator::PodOrchestration;

/// Turns deployment lifecycle events into pod create/delete deltas.
pub struct DeploymentUpdaterController {
    repo: Repository,
    orchestrator: Arc<dyn PodOrchestration>,
}

impl DeploymentUpdaterController {
    pub fn new(repo: Repository, orchestrator: Arc<dyn PodOrchestration>) -> Self {
        Self { repo, orchestrator }
    }

    pub async fn on_created(&self, deployment: &Deployment) -> Result<()> {
        info!(deployment=%deployment.name, replicas=deployment.replicas, "deployment created");
        self.create_pods(deployment, deployment.replicas as usize).await
    }

    /// A template change replaces every owned pod with `new.replicas` fresh ones,
    /// which already covers any replica change in the same update.
    pub async fn on_updated(&self, old: &Deployment, new: &Deployment) -> Result<()> {
        if !old.template.is_equivalent(&new.template) {
            info!(deployment=%new.name, replicas=new.replicas, "template changed, replacing all pods");
            self.delete_pods(&old.id, None).await?;
            return self.create_pods(new, new.replicas as usize).await;
        }

        let delta = i64::from(new.replicas) - i64::from(old.replicas);
        if delta > 0 {
            info!(deployment=%new.name, from=old.replicas, to=new.replicas, "scaling up");
            self.create_pods(new, delta as usize).await?;
        } else if delta < 0 {
            info!(deployment=%new.name, from=old.replicas, to=new.replicas, "scaling down");
            self.delete_pods(&new.id, Some(delta.unsigned_abs() as usize))
                .await?;
        }
        Ok(())
    }

    pub async fn on_deleted(&self, deployment: &Deployment) -> Result<()> {
        info!(deployment=%deployment.name, "deployment deleted, removing its pods");
        self.delete_pods(&deployment.id, None).await
    }

    /// Replace owned pods one at a time: each is deleted before its
    /// replacement is created.
    pub async fn rollout_restart(&self, deployment: &Deployment) -> Result<()> {
        let pods = self.repo.pods_by_deployment(&deployment.id).await?;
        info!(deployment=%deployment.name, pods=pods.len(), "rollout restart");
        for pod in &pods {
            self.orchestrator.delete_pod(pod).await?;
            self.orchestrator
                .create_pod(deployment.instantiate_pod())
                .await?;
        }
        Ok(())
    }

    async fn create_pods(&self, deployment: &Deployment, count: usize) -> Result<()> {
        for created in 0..count {
            if let Err(e) = self
                .orchestrator
                .create_pod(deployment.instantiate_pod())
                .await
            {
                warn!(
                    deployment=%deployment.name,
                    created,
                    requested=count,
                    error=%e,
                    "pod creation failed, skipping the remaining replicas"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Delete owned pods, oldest first. `None` deletes all of them.
    async fn delete_pods(&self, deployment_id: &str, limit: Option<usize>) -> Result<()> {
        let pods = self.repo.pods_by_deployment(deployment_id).await?;
        let n = limit.map_or(pods.len(), |l| l.min(pods.len()));
        for pod in &pods[..n] {
            self.orchestrator.delete_pod(pod).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler<Deployment> for DeploymentUpdaterController {
    async fn handle(&self, change: Change<Deployment>) -> Result<()> {
        match change {
            Change::Created(d) => self.on_created(&d).await,
            Change::Updated { old, new } => self.on_updated(&old, &new).await,
            Change::Deleted(d) => self.on_deleted(&d).await,
        }
    }
}
