use maden_common::keys::{pod_key, PODS_PREFIX};
use maden_common::{Error, Pod, ResourceKind, Result};

use super::Repository;

impl Repository {
    /// At-most-once creation keyed by pod id.
    pub async fn create_pod(&self, pod: &Pod) -> Result<()> {
        self.create_record(&pod_key(&pod.id), pod, ResourceKind::Pod, &pod.id)
            .await
    }

    pub async fn get_pod(&self, pod_id: &str) -> Result<Pod> {
        self.get_record(&pod_key(pod_id))
            .await?
            .map(|v| v.value)
            .ok_or_else(|| Error::not_found(ResourceKind::Pod, pod_id))
    }

    pub async fn list_pods(&self) -> Result<Vec<Pod>> {
        Ok(self
            .list_records(PODS_PREFIX)
            .await?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    /// Pods owned by a deployment, oldest first (ties broken by name).
    pub async fn pods_by_deployment(&self, deployment_id: &str) -> Result<Vec<Pod>> {
        let mut pods: Vec<Pod> = self
            .list_pods()
            .await?
            .into_iter()
            .filter(|p| p.is_owned_by(deployment_id))
            .collect();
        pods.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(pods)
    }

    /// Overwrite an existing pod. A pod deleted in the meantime is not recreated.
    pub async fn update_pod(&self, pod: &Pod) -> Result<()> {
        self.update_record(&pod_key(&pod.id), pod, ResourceKind::Pod, &pod.id)
            .await
    }

    pub async fn delete_pod(&self, pod_id: &str) -> Result<()> {
        self.delete_record(&pod_key(pod_id), ResourceKind::Pod, pod_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use maden_common::{PodStatus, Resources, RestartPolicy};

    use super::*;
    use crate::repo::test_support::memory_repo;
    use crate::MetaStore;

    fn pod(id: &str, deployment_id: &str, age_secs: i64) -> Pod {
        Pod {
            id: id.into(),
            name: id.into(),
            deployment_id: deployment_id.into(),
            status: PodStatus::Pending,
            node_id: String::new(),
            containers: vec![],
            resources: Resources::default(),
            affinity: HashMap::new(),
            anti_affinity: HashMap::new(),
            tolerations: HashMap::new(),
            restart_policy: RestartPolicy::Always,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn owned_pods_are_oldest_first() {
        let repo = memory_repo();
        repo.create_pod(&pod("a", "dep", 10)).await.unwrap();
        repo.create_pod(&pod("b", "dep", 30)).await.unwrap();
        repo.create_pod(&pod("c", "other", 50)).await.unwrap();
        repo.create_pod(&pod("d", "", 60)).await.unwrap();

        let ids: Vec<String> = repo
            .pods_by_deployment("dep")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_pod_are_not_found() {
        let repo = memory_repo();
        let p = pod("ghost", "", 0);
        assert!(repo.update_pod(&p).await.unwrap_err().is_not_found());
        assert!(repo.delete_pod("ghost").await.unwrap_err().is_not_found());
        assert!(repo.get_pod("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_in_listings() {
        let repo = memory_repo();
        repo.create_pod(&pod("a", "dep", 0)).await.unwrap();
        repo.store()
            .put("/pods/broken", b"{not json".to_vec())
            .await
            .unwrap();
        assert_eq!(repo.list_pods().await.unwrap().len(), 1);
    }
}
