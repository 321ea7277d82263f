use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use maden_common::{Pod, PodStatus, Result, RestartPolicy};
use maden_node::PodManager;

use crate::listener::{Change, ResourceHandler};
use crate::metrics::ControlPlaneMetrics;

/// True only for a transition into `Failed` on a pod that may be restarted.
pub fn should_restart(old: &Pod, new: &Pod) -> bool {
    old.status != new.status
        && new.restart_policy != RestartPolicy::Never
        && new.status == PodStatus::Failed
}

/// Restarts failed pods on the node they are already assigned to.
///
/// Restarts are immediate and unbounded.
pub struct PodUpdaterController {
    manager: Arc<dyn PodManager>,
    metrics: Arc<ControlPlaneMetrics>,
}

impl PodUpdaterController {
    pub fn new(manager: Arc<dyn PodManager>, metrics: Arc<ControlPlaneMetrics>) -> Self {
        Self { manager, metrics }
    }

    pub async fn on_updated(&self, old: &Pod, new: Pod) -> Result<()> {
        if !should_restart(old, &new) {
            return Ok(());
        }

        ControlPlaneMetrics::inc(&self.metrics.pod_restarts_total);
        info!(pod_id=%new.id, node_id=%new.node_id, policy=?new.restart_policy, "pod failed, restarting");
        let pod = self.manager.run_pod(new).await?;
        if pod.status == PodStatus::Failed {
            warn!(pod_id=%pod.id, "restart failed");
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler<Pod> for PodUpdaterController {
    async fn handle(&self, change: Change<Pod>) -> Result<()> {
        match change {
            Change::Updated { old, new } => self.on_updated(&old, new).await,
            Change::Created(_) | Change::Deleted(_) => Ok(()),
        }
    }
}
