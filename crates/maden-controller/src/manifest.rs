use serde::Deserialize;
use tracing::info;

use maden_common::{
    DeploymentSpec, Error, PersistentVolumeClaimSpec, PersistentVolumeSpec, Result, ServiceSpec,
};

use crate::deployment::DeploymentController;
use crate::service::ServiceController;
use crate::volume::VolumeController;

/// A desired-state document: `{"kind": "Deployment", "spec": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum Manifest {
    Deployment(DeploymentSpec),
    Service(ServiceSpec),
    PersistentVolume(PersistentVolumeSpec),
    PersistentVolumeClaim(PersistentVolumeClaimSpec),
}

/// Parse a single manifest or a JSON array of them.
pub fn parse_manifests(bytes: &[u8]) -> Result<Vec<Manifest>> {
    let doc: serde_json::Value = serde_json::from_slice(bytes)?;
    match doc {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(doc)?]),
        _ => Err(Error::Validation(
            "manifest must be an object or an array of objects".into(),
        )),
    }
}

/// Route each manifest to its controller, stopping at the first failure.
pub async fn apply_manifests(
    manifests: Vec<Manifest>,
    deployments: &DeploymentController,
    services: &ServiceController,
    volumes: &VolumeController,
) -> Result<()> {
    for manifest in manifests {
        match manifest {
            Manifest::Deployment(spec) => {
                let d = deployments.handle_incoming_deployment(spec).await?;
                info!(deployment=%d.name, replicas=d.replicas, "applied deployment manifest");
            }
            Manifest::Service(spec) => {
                let s = services.handle_incoming_service(spec).await?;
                info!(service=%s.name, "applied service manifest");
            }
            Manifest::PersistentVolume(spec) => {
                let v = volumes.handle_incoming_volume(spec).await?;
                info!(volume=%v.name, "applied persistent volume manifest");
            }
            Manifest::PersistentVolumeClaim(spec) => {
                let c = volumes.handle_incoming_claim(spec).await?;
                info!(claim=%c.name, volume=%c.volume_name, "applied persistent volume claim manifest");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::deployment_updater::DeploymentUpdaterController;
    use crate::testing::{memory_repo, RecordingOrchestrator};

    const MIXED: &str = r#"[
        {
            "kind": "Deployment",
            "spec": {
                "name": "web",
                "replicas": 2,
                "selector": { "match_labels": { "app": "web" } },
                "template": {
                    "metadata": { "labels": { "app": "web" } },
                    "spec": {
                        "containers": [{ "image": "nginx:1.27", "ports": [{ "container_port": 80 }] }],
                        "resources": { "cpu": 1, "memory": 256 },
                        "restart_policy": "OnFailure"
                    }
                }
            }
        },
        {
            "kind": "Service",
            "spec": { "name": "web", "selector": { "app": "web" }, "ports": [{ "port": 80, "target_port": 80 }] }
        },
        {
            "kind": "PersistentVolume",
            "spec": {
                "name": "web-data",
                "capacity": { "storage": "10Gi" },
                "access_modes": ["ReadWriteOnce"],
                "reclaim_policy": "Delete",
                "storage_class_name": "local"
            }
        },
        {
            "kind": "PersistentVolumeClaim",
            "spec": {
                "name": "web-data",
                "access_modes": ["ReadWriteOnce"],
                "resources": { "storage": "2Gi" },
                "volume_name": "web-data"
            }
        }
    ]"#;

    #[test]
    fn parses_single_and_list() {
        let all = parse_manifests(MIXED.as_bytes()).unwrap();
        assert_eq!(all.len(), 4);
        let Manifest::Deployment(spec) = &all[0] else {
            panic!("expected a deployment");
        };
        assert_eq!(spec.replicas, 2);
        assert_eq!(spec.template.spec.containers[0].ports[0].container_port, 80);
        assert_eq!(
            spec.template.spec.restart_policy,
            maden_common::RestartPolicy::OnFailure
        );

        let one = parse_manifests(
            br#"{"kind":"Service","spec":{"name":"db","selector":{},"ports":[]}}"#,
        )
        .unwrap();
        assert!(matches!(&one[0], Manifest::Service(s) if s.name == "db"));

        let Manifest::PersistentVolume(pv) = &all[2] else {
            panic!("expected a persistent volume");
        };
        assert_eq!(pv.reclaim_policy, maden_common::ReclaimPolicy::Delete);
        assert!(matches!(&all[3], Manifest::PersistentVolumeClaim(c) if c.volume_name == "web-data"));
    }

    #[test]
    fn rejects_unknown_kinds_and_scalars() {
        assert!(parse_manifests(br#"{"kind":"Volume","spec":{}}"#).is_err());
        assert!(matches!(
            parse_manifests(b"42"),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn apply_routes_to_controllers() {
        let repo = memory_repo();
        let orch = Arc::new(RecordingOrchestrator::new(repo.clone()));
        let updater = Arc::new(DeploymentUpdaterController::new(repo.clone(), orch));
        let deployments = DeploymentController::new(repo.clone(), updater);
        let services = ServiceController::new(repo.clone());
        let volumes = VolumeController::new(repo.clone());

        let manifests = parse_manifests(MIXED.as_bytes()).unwrap();
        apply_manifests(manifests, &deployments, &services, &volumes)
            .await
            .unwrap();

        assert_eq!(repo.get_deployment("web").await.unwrap().replicas, 2);
        assert_eq!(repo.get_service("web").await.unwrap().ports.len(), 1);
        assert_eq!(repo.get_volume("web-data").await.unwrap().capacity["storage"], "10Gi");
        assert!(repo.get_claim("web-data").await.unwrap().is_bound());
    }

    #[tokio::test]
    async fn claim_before_its_volume_stops_the_apply() {
        let repo = memory_repo();
        let orch = Arc::new(RecordingOrchestrator::new(repo.clone()));
        let updater = Arc::new(DeploymentUpdaterController::new(repo.clone(), orch));
        let deployments = DeploymentController::new(repo.clone(), updater);
        let services = ServiceController::new(repo.clone());
        let volumes = VolumeController::new(repo.clone());

        let manifests = parse_manifests(
            br#"[
                {"kind":"PersistentVolumeClaim","spec":{"name":"c","volume_name":"v"}},
                {"kind":"PersistentVolume","spec":{"name":"v"}}
            ]"#,
        )
        .unwrap();
        let err = apply_manifests(manifests, &deployments, &services, &volumes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(repo.list_volumes().await.unwrap().is_empty());
    }
}
