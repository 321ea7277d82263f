use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::id::{random_id, unique_id};
use crate::node::Resources;
use crate::pod::{Container, Pod, PodStatus, RestartPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodSpec {
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
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodTemplate {
    #[serde(default)]
    pub metadata: Metadata,
    pub spec: PodSpec,
}

impl PodTemplate {
    /// Two templates are equivalent when every container has the same image and
    /// port list, in order, and the template labels match. Other pod spec fields
    /// do not take part in the comparison.
    pub fn is_equivalent(&self, other: &PodTemplate) -> bool {
        self.metadata.labels == other.metadata.labels
            && self.spec.containers.len() == other.spec.containers.len()
            && self
                .spec
                .containers
                .iter()
                .zip(&other.spec.containers)
                .all(|(a, b)| a.image == b.image && a.ports == b.ports)
    }
}

/// Desired state as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentSpec {
    pub name: String,
    pub replicas: u32,
    #[serde(default)]
    pub selector: LabelSelector,
    pub template: PodTemplate,
}

/// A deployment as recorded under `/deployments/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub replicas: u32,
    #[serde(default)]
    pub selector: LabelSelector,
    pub template: PodTemplate,
}

impl Deployment {
    pub fn from_spec(spec: DeploymentSpec) -> Self {
        Self {
            id: random_id(10),
            name: spec.name,
            replicas: spec.replicas,
            selector: spec.selector,
            template: spec.template,
        }
    }

    pub fn needs_update(&self, spec: &DeploymentSpec) -> bool {
        self.replicas != spec.replicas
            || self.selector.match_labels != spec.selector.match_labels
            || !self.template.is_equivalent(&spec.template)
    }

    pub fn apply(&mut self, spec: DeploymentSpec) {
        self.replicas = spec.replicas;
        self.selector = spec.selector;
        self.template = spec.template;
    }

    /// Build a fresh pending pod from the current template. The pod keeps no
    /// reference to the template afterwards.
    pub fn instantiate_pod(&self) -> Pod {
        let id = unique_id();
        let suffix = id.replace('-', "");
        let spec = &self.template.spec;
        Pod {
            name: format!("{}-{}", self.name, suffix),
            id,
            deployment_id: self.id.clone(),
            status: PodStatus::Pending,
            node_id: String::new(),
            containers: spec.containers.clone(),
            resources: spec.resources,
            affinity: spec.affinity.clone(),
            anti_affinity: spec.anti_affinity.clone(),
            tolerations: spec.tolerations.clone(),
            restart_policy: spec.restart_policy,
            created_at: Utc::now(),
        }
    }
}
