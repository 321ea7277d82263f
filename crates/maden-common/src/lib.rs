pub mod deployment;
pub mod error;
pub mod id;
pub mod keys;
pub mod node;
pub mod pod;
pub mod service;
pub mod telemetry;
pub mod volume;

pub use deployment::{Deployment, DeploymentSpec, LabelSelector, Metadata, PodSpec, PodTemplate};
pub use error::{Error, ResourceKind, Result};
pub use node::{Node, NodeStatus, Resources};
pub use pod::{Container, ContainerPort, Pod, PodStatus, RestartPolicy};
pub use service::{Service, ServicePort, ServiceSpec};
pub use volume::{
    AccessMode, PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeSpec, ReclaimPolicy,
};
