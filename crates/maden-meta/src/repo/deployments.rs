use maden_common::keys::{deployment_key, DEPLOYMENTS_PREFIX};
use maden_common::{Deployment, Error, ResourceKind, Result};

use super::Repository;

impl Repository {
    pub async fn create_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.create_record(
            &deployment_key(&deployment.name),
            deployment,
            ResourceKind::Deployment,
            &deployment.name,
        )
        .await
    }

    /// `Ok(None)` when no deployment has this name.
    pub async fn find_deployment(&self, name: &str) -> Result<Option<Deployment>> {
        Ok(self
            .get_record(&deployment_key(name))
            .await?
            .map(|v| v.value))
    }

    pub async fn get_deployment(&self, name: &str) -> Result<Deployment> {
        self.find_deployment(name)
            .await?
            .ok_or_else(|| Error::not_found(ResourceKind::Deployment, name))
    }

    pub async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        Ok(self
            .list_records(DEPLOYMENTS_PREFIX)
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    pub async fn update_deployment(&self, deployment: &Deployment) -> Result<()> {
        self.put_record(&deployment_key(&deployment.name), deployment)
            .await
    }

    pub async fn delete_deployment(&self, name: &str) -> Result<()> {
        self.delete_record(&deployment_key(name), ResourceKind::Deployment, name)
            .await
    }
}
