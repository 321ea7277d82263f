//! Shared fixtures and recording fakes for the controller tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use maden_common::{
    Container, Deployment, DeploymentSpec, Error, LabelSelector, Metadata, Node, NodeStatus, Pod,
    PodSpec, PodStatus, PodTemplate, Resources, RestartPolicy, Result,
};
use maden_meta::{MemoryMetaStore, Repository, DEFAULT_STORE_TIMEOUT};
use maden_node::{LogStream, PodManager};

use crate::orchestrator::PodOrchestration;

pub fn memory_repo() -> Repository {
    Repository::new(Arc::new(MemoryMetaStore::new()), DEFAULT_STORE_TIMEOUT)
}

pub fn ready_node(id: &str, cpu: u64, memory: u64) -> Node {
    Node {
        id: id.into(),
        name: id.into(),
        status: NodeStatus::Ready,
        capacity: Resources::new(cpu, memory),
        used: Resources::default(),
        labels: HashMap::new(),
        taints: HashMap::new(),
    }
}

pub fn pod_with_images(id: &str, images: &[&str]) -> Pod {
    Pod {
        id: id.into(),
        name: id.into(),
        deployment_id: String::new(),
        status: PodStatus::Pending,
        node_id: String::new(),
        containers: images.iter().map(|i| Container::new(*i)).collect(),
        resources: Resources::new(1, 128),
        affinity: HashMap::new(),
        anti_affinity: HashMap::new(),
        tolerations: HashMap::new(),
        restart_policy: RestartPolicy::Always,
        created_at: Utc::now(),
    }
}

pub fn deployment_spec(name: &str, replicas: u32, image: &str) -> DeploymentSpec {
    DeploymentSpec {
        name: name.into(),
        replicas,
        selector: LabelSelector {
            match_labels: HashMap::from([("app".to_string(), name.to_string())]),
        },
        template: PodTemplate {
            metadata: Metadata {
                labels: HashMap::from([("app".to_string(), name.to_string())]),
            },
            spec: PodSpec {
                containers: vec![Container::new(image)],
                resources: Resources::new(1, 128),
                ..Default::default()
            },
        },
    }
}

pub fn deployment(name: &str, replicas: u32, image: &str) -> Deployment {
    Deployment::from_spec(deployment_spec(name, replicas, image))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodCall {
    Create(String),
    Delete(String),
}

/// Records every call and keeps the pod records in the repository, without
/// scheduling or starting anything.
pub struct RecordingOrchestrator {
    repo: Repository,
    calls: Mutex<Vec<PodCall>>,
    created: Mutex<Vec<Pod>>,
    fail_after: Option<usize>,
}

impl RecordingOrchestrator {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            fail_after: None,
        }
    }

    /// Fail every create once `n` creates have succeeded.
    pub fn failing_after(repo: Repository, n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new(repo)
        }
    }

    pub fn calls(&self) -> Vec<PodCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<Pod> {
        self.created.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PodCall::Create(_)))
            .count()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PodCall::Delete(id) => Some(id),
                PodCall::Create(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl PodOrchestration for RecordingOrchestrator {
    async fn create_pod(&self, pod: Pod) -> Result<Pod> {
        if let Some(n) = self.fail_after {
            if self.created.lock().unwrap().len() >= n {
                return Err(Error::store(anyhow::anyhow!("injected failure")));
            }
        }
        self.repo.create_pod(&pod).await?;
        self.calls.lock().unwrap().push(PodCall::Create(pod.id.clone()));
        self.created.lock().unwrap().push(pod.clone());
        Ok(pod)
    }

    async fn delete_pod(&self, pod: &Pod) -> Result<()> {
        self.repo.delete_pod(&pod.id).await?;
        self.calls.lock().unwrap().push(PodCall::Delete(pod.id.clone()));
        Ok(())
    }
}

/// Counts `run_pod` calls and reports each pod back as running.
#[derive(Default)]
pub struct RecordingPodManager {
    runs: Mutex<Vec<Pod>>,
}

impl RecordingPodManager {
    pub fn runs(&self) -> Vec<Pod> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl PodManager for RecordingPodManager {
    async fn run_pod(&self, mut pod: Pod) -> Result<Pod> {
        self.runs.lock().unwrap().push(pod.clone());
        pod.status = PodStatus::Running;
        Ok(pod)
    }

    async fn stop_pod(&self, _pod: &Pod) -> Result<()> {
        Ok(())
    }

    async fn container_logs(
        &self,
        pod: &Pod,
        _container: Option<&str>,
        _follow: bool,
    ) -> Result<LogStream> {
        Err(Error::Validation(format!("no logs for {}", pod.id)))
    }

    async fn exec(&self, pod: &Pod, _container: Option<&str>, _command: &str) -> Result<String> {
        Err(Error::Validation(format!("no exec for {}", pod.id)))
    }
}
