use std::sync::Arc;

use tracing::{debug, info};

use maden_common::{Deployment, DeploymentSpec, Error, Result};
use maden_meta::Repository;

use crate::deployment_updater::DeploymentUpdaterController;

/// Records desired deployment state. Pods follow later through the watch.
pub struct DeploymentController {
    repo: Repository,
    updater: Arc<DeploymentUpdaterController>,
}

impl DeploymentController {
    pub fn new(repo: Repository, updater: Arc<DeploymentUpdaterController>) -> Self {
        Self { repo, updater }
    }

    /// Create the deployment, or update it when replicas, selector or template
    /// differ from what is stored. An identical spec writes nothing.
    pub async fn handle_incoming_deployment(&self, spec: DeploymentSpec) -> Result<Deployment> {
        if spec.name.is_empty() {
            return Err(Error::Validation("deployment name must not be empty".into()));
        }

        match self.repo.find_deployment(&spec.name).await? {
            None => {
                let deployment = Deployment::from_spec(spec);
                self.repo.create_deployment(&deployment).await?;
                info!(deployment=%deployment.name, id=%deployment.id, "deployment recorded");
                Ok(deployment)
            }
            Some(mut existing) if existing.needs_update(&spec) => {
                existing.apply(spec);
                self.repo.update_deployment(&existing).await?;
                info!(deployment=%existing.name, replicas=existing.replicas, "deployment updated");
                Ok(existing)
            }
            Some(existing) => {
                debug!(deployment=%existing.name, "deployment unchanged");
                Ok(existing)
            }
        }
    }

    pub async fn get_deployment(&self, name: &str) -> Result<Deployment> {
        self.repo.get_deployment(name).await
    }

    pub async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        self.repo.list_deployments().await
    }

    pub async fn scale_deployment(&self, name: &str, replicas: u32) -> Result<Deployment> {
        let mut deployment = self.repo.get_deployment(name).await?;
        if deployment.replicas == replicas {
            return Ok(deployment);
        }
        info!(deployment=%name, from=deployment.replicas, to=replicas, "scaling deployment");
        deployment.replicas = replicas;
        self.repo.update_deployment(&deployment).await?;
        Ok(deployment)
    }

    /// Owned pods are removed by the watch reacting to the delete.
    pub async fn delete_deployment(&self, name: &str) -> Result<()> {
        self.repo.delete_deployment(name).await?;
        info!(deployment=%name, "deployment deleted");
        Ok(())
    }

    pub async fn rollout_restart(&self, name: &str) -> Result<()> {
        let deployment = self.repo.get_deployment(name).await?;
        self.updater.rollout_restart(&deployment).await
    }
}
