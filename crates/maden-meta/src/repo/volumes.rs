use maden_common::keys::{claim_key, volume_key, CLAIMS_PREFIX, VOLUMES_PREFIX};
use maden_common::{Error, PersistentVolume, PersistentVolumeClaim, ResourceKind, Result};

use super::Repository;

impl Repository {
    pub async fn create_volume(&self, volume: &PersistentVolume) -> Result<()> {
        self.create_record(
            &volume_key(&volume.name),
            volume,
            ResourceKind::PersistentVolume,
            &volume.name,
        )
        .await
    }

    pub async fn find_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        Ok(self.get_record(&volume_key(name)).await?.map(|v| v.value))
    }

    pub async fn get_volume(&self, name: &str) -> Result<PersistentVolume> {
        self.find_volume(name)
            .await?
            .ok_or_else(|| Error::not_found(ResourceKind::PersistentVolume, name))
    }

    pub async fn list_volumes(&self) -> Result<Vec<PersistentVolume>> {
        Ok(self
            .list_records(VOLUMES_PREFIX)
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    pub async fn update_volume(&self, volume: &PersistentVolume) -> Result<()> {
        self.update_record(
            &volume_key(&volume.name),
            volume,
            ResourceKind::PersistentVolume,
            &volume.name,
        )
        .await
    }

    pub async fn delete_volume(&self, name: &str) -> Result<()> {
        self.delete_record(&volume_key(name), ResourceKind::PersistentVolume, name)
            .await
    }

    pub async fn create_claim(&self, claim: &PersistentVolumeClaim) -> Result<()> {
        self.create_record(
            &claim_key(&claim.name),
            claim,
            ResourceKind::PersistentVolumeClaim,
            &claim.name,
        )
        .await
    }

    pub async fn find_claim(&self, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self.get_record(&claim_key(name)).await?.map(|v| v.value))
    }

    pub async fn get_claim(&self, name: &str) -> Result<PersistentVolumeClaim> {
        self.find_claim(name)
            .await?
            .ok_or_else(|| Error::not_found(ResourceKind::PersistentVolumeClaim, name))
    }

    pub async fn list_claims(&self) -> Result<Vec<PersistentVolumeClaim>> {
        Ok(self
            .list_records(CLAIMS_PREFIX)
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    pub async fn update_claim(&self, claim: &PersistentVolumeClaim) -> Result<()> {
        self.update_record(
            &claim_key(&claim.name),
            claim,
            ResourceKind::PersistentVolumeClaim,
            &claim.name,
        )
        .await
    }

    pub async fn delete_claim(&self, name: &str) -> Result<()> {
        self.delete_record(&claim_key(name), ResourceKind::PersistentVolumeClaim, name)
            .await
    }
}
