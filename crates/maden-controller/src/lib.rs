//! Control-plane reasoning: reconciliation of deployments into pods, pod
//! placement and startup hand-off, and the watch loops that drive them.

pub mod deployment;
pub mod deployment_updater;
pub mod listener;
pub mod manifest;
pub mod metrics;
pub mod orchestrator;
pub mod pod_updater;
pub mod service;
pub mod volume;

pub use deployment::DeploymentController;
pub use deployment_updater::DeploymentUpdaterController;
pub use listener::{Change, ChangeListener, ListenerHandle, ResourceHandler};
pub use manifest::{apply_manifests, parse_manifests, Manifest};
pub use metrics::ControlPlaneMetrics;
pub use orchestrator::{PodOrchestration, PodOrchestrator};
pub use pod_updater::{should_restart, PodUpdaterController};
pub use service::{ServiceController, ServiceUpdaterController};
pub use volume::VolumeController;

#[cfg(test)]
pub(crate) mod testing;
