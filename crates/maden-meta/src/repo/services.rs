use maden_common::keys::{service_key, SERVICES_PREFIX};
use maden_common::{Error, ResourceKind, Result, Service};

use super::Repository;

impl Repository {
    pub async fn create_service(&self, service: &Service) -> Result<()> {
        self.create_record(
            &service_key(&service.name),
            service,
            ResourceKind::Service,
            &service.name,
        )
        .await
    }

    pub async fn find_service(&self, name: &str) -> Result<Option<Service>> {
        Ok(self.get_record(&service_key(name)).await?.map(|v| v.value))
    }

    pub async fn get_service(&self, name: &str) -> Result<Service> {
        self.find_service(name)
            .await?
            .ok_or_else(|| Error::not_found(ResourceKind::Service, name))
    }

    pub async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(self
            .list_records(SERVICES_PREFIX)
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    pub async fn update_service(&self, service: &Service) -> Result<()> {
        self.put_record(&service_key(&service.name), service).await
    }

    pub async fn delete_service(&self, name: &str) -> Result<()> {
        self.delete_record(&service_key(name), ResourceKind::Service, name)
            .await
    }
}
