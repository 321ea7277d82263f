use async_trait::async_trait;
use tracing::{debug, info};

use maden_common::{Error, Result, Service, ServiceSpec};
use maden_meta::Repository;

use crate::listener::{Change, ResourceHandler};

pub struct ServiceController {
    repo: Repository,
}

impl ServiceController {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create the service, or update its selector and ports when they differ.
    pub async fn handle_incoming_service(&self, spec: ServiceSpec) -> Result<Service> {
        if spec.name.is_empty() {
            return Err(Error::Validation("service name must not be empty".into()));
        }

        match self.repo.find_service(&spec.name).await? {
            None => {
                let service = Service::from_spec(spec);
                self.repo.create_service(&service).await?;
                info!(service=%service.name, id=%service.id, "service recorded");
                Ok(service)
            }
            Some(mut existing) if existing.needs_update(&spec) => {
                existing.apply(spec);
                self.repo.update_service(&existing).await?;
                info!(service=%existing.name, "service updated");
                Ok(existing)
            }
            Some(existing) => {
                debug!(service=%existing.name, "service unchanged");
                Ok(existing)
            }
        }
    }

    pub async fn get_service(&self, name: &str) -> Result<Service> {
        self.repo.get_service(name).await
    }

    pub async fn list_services(&self) -> Result<Vec<Service>> {
        self.repo.list_services().await
    }

    pub async fn delete_service(&self, name: &str) -> Result<()> {
        self.repo.delete_service(name).await
    }
}

/// Observes service changes. Address and name allocation happen elsewhere.
#[derive(Default)]
pub struct ServiceUpdaterController;

#[async_trait]
impl ResourceHandler<Service> for ServiceUpdaterController {
    async fn handle(&self, change: Change<Service>) -> Result<()> {
        match change {
            Change::Created(s) => info!(service=%s.name, ports=s.ports.len(), "service created"),
            Change::Updated { old, new } => info!(
                service=%new.name,
                old_ports=old.ports.len(),
                new_ports=new.ports.len(),
                "service updated"
            ),
            Change::Deleted(s) => info!(service=%s.name, "service deleted"),
        }
        Ok(())
    }
}
