use tracing::{debug, info};

use maden_common::{
    Error, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeSpec, Result,
};
use maden_meta::Repository;

/// Records persistent volumes and the claims bound to them.
pub struct VolumeController {
    repo: Repository,
}

impl VolumeController {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create the volume, or update it in place when the spec differs.
    pub async fn handle_incoming_volume(
        &self,
        spec: PersistentVolumeSpec,
    ) -> Result<PersistentVolume> {
        if spec.name.is_empty() {
            return Err(Error::Validation("volume name must not be empty".into()));
        }

        match self.repo.find_volume(&spec.name).await? {
            None => {
                let volume = PersistentVolume::from_spec(spec);
                self.repo.create_volume(&volume).await?;
                info!(volume=%volume.name, id=%volume.id, "persistent volume recorded");
                Ok(volume)
            }
            Some(mut existing) if existing.needs_update(&spec) => {
                existing.apply(spec);
                self.repo.update_volume(&existing).await?;
                info!(volume=%existing.name, "persistent volume updated");
                Ok(existing)
            }
            Some(existing) => {
                debug!(volume=%existing.name, "persistent volume unchanged");
                Ok(existing)
            }
        }
    }

    /// Create or update a claim. A claim naming a volume must name one that
    /// exists and offers every access mode the claim asks for.
    pub async fn handle_incoming_claim(
        &self,
        spec: PersistentVolumeClaimSpec,
    ) -> Result<PersistentVolumeClaim> {
        if spec.name.is_empty() {
            return Err(Error::Validation("claim name must not be empty".into()));
        }
        if !spec.volume_name.is_empty() {
            let Some(volume) = self.repo.find_volume(&spec.volume_name).await? else {
                return Err(Error::Validation(format!(
                    "claim {} names unknown volume {}",
                    spec.name, spec.volume_name
                )));
            };
            if !volume.supports(&spec.access_modes) {
                return Err(Error::Validation(format!(
                    "volume {} does not offer the access modes claim {} requests",
                    volume.name, spec.name
                )));
            }
        }

        match self.repo.find_claim(&spec.name).await? {
            None => {
                let claim = PersistentVolumeClaim::from_spec(spec);
                self.repo.create_claim(&claim).await?;
                info!(claim=%claim.name, volume=%claim.volume_name, "persistent volume claim recorded");
                Ok(claim)
            }
            Some(mut existing) if existing.needs_update(&spec) => {
                existing.apply(spec);
                self.repo.update_claim(&existing).await?;
                info!(claim=%existing.name, volume=%existing.volume_name, "persistent volume claim updated");
                Ok(existing)
            }
            Some(existing) => {
                debug!(claim=%existing.name, "persistent volume claim unchanged");
                Ok(existing)
            }
        }
    }

    pub async fn get_volume(&self, name: &str) -> Result<PersistentVolume> {
        self.repo.get_volume(name).await
    }

    pub async fn list_volumes(&self) -> Result<Vec<PersistentVolume>> {
        self.repo.list_volumes().await
    }

    /// Delete a volume no claim is bound to.
    pub async fn delete_volume(&self, name: &str) -> Result<()> {
        let claims = self.repo.list_claims().await?;
        if let Some(claim) = claims.iter().find(|c| c.volume_name == name) {
            return Err(Error::Validation(format!(
                "volume {name} is still bound to claim {}",
                claim.name
            )));
        }
        self.repo.delete_volume(name).await
    }

    pub async fn get_claim(&self, name: &str) -> Result<PersistentVolumeClaim> {
        self.repo.get_claim(name).await
    }

    pub async fn list_claims(&self) -> Result<Vec<PersistentVolumeClaim>> {
        self.repo.list_claims().await
    }

    pub async fn delete_claim(&self, name: &str) -> Result<()> {
        self.repo.delete_claim(name).await
    }
}
