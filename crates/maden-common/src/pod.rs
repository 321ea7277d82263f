use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ResourceKind, Result};
use crate::node::Resources;

/// Pod lifecycle phase. Ordering follows the lifecycle so `status >= Scheduled`
/// means the pod has been placed on a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PodStatus {
    Pending,
    Scheduled,
    ContainerCreating,
    Running,
    Failed,
    Restarted,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RestartPolicy {
    #[default]
    Always,
    OnFailure,
    Never,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContainerPort {
    pub container_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    #[serde(default)]
    pub name: String,
    pub image: String,
    /// Runtime id, assigned once the container has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

impl Container {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            image: image.into(),
            container_id: None,
            ports: Vec::new(),
        }
    }
}

/// A pod as recorded under `/pods/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pod {
    pub id: String,
    pub name: String,
    /// Empty for standalone pods.
    #[serde(default)]
    pub deployment_id: String,
    pub status: PodStatus,
    /// Empty until scheduled.
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub affinity: HashMap<String, String>,
    #[serde(default)]
    pub anti_affinity: HashMap<String, String>,
    #[serde(default)]
    pub tolerations: HashMap<String, String>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Pod {
    pub fn is_owned_by(&self, deployment_id: &str) -> bool {
        !self.deployment_id.is_empty() && self.deployment_id == deployment_id
    }

    /// Pick the container a logs/exec request targets.
    ///
    /// A single-container pod is addressed implicitly. With several containers the
    /// caller must name one, either by runtime id or by container name.
    pub fn resolve_container(&self, requested: Option<&str>) -> Result<&Container> {
        match self.containers.as_slice() {
            [] => Err(Error::Validation(format!(
                "pod {} has no containers",
                self.id
            ))),
            [only] => Ok(only),
            many => {
                let wanted = requested.filter(|r| !r.is_empty()).ok_or_else(|| {
                    Error::Validation(format!(
                        "pod {} has {} containers, a container id is required",
                        self.id,
                        many.len()
                    ))
                })?;
                many.iter()
                    .find(|c| {
                        c.container_id.as_deref() == Some(wanted)
                            || (!c.name.is_empty() && c.name == wanted)
                    })
                    .ok_or_else(|| Error::NotFound {
                        kind: ResourceKind::Pod,
                        id: format!("{}/{}", self.id, wanted),
                    })
            }
        }
    }

    /// Runtime id of the resolved container.
    pub fn runtime_container_id(&self, requested: Option<&str>) -> Result<String> {
        let container = self.resolve_container(requested)?;
        container.container_id.clone().ok_or_else(|| {
            Error::Validation(format!(
                "container {} of pod {} has not been created yet",
                container.image, self.id
            ))
        })
    }
}
