use tracing::{debug, info, warn};

use maden_common::{Error, Node, Pod, PodStatus, Result};
use maden_meta::{Repository, Versioned};

use crate::predicates::fits;

/// Commit attempts per node before giving up on a contended record.
const MAX_COMMIT_ATTEMPTS: usize = 8;

/// First-fit pod placement over the registered nodes.
///
/// The read-check-write on a node's `used` resources is committed with a
/// compare-and-swap on the node revision, so concurrent schedulers can never
/// both claim the last free capacity of the same node.
#[derive(Clone)]
pub struct Scheduler {
    repo: Repository,
}

impl Scheduler {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Assign `pod` to the first node that passes every predicate, in listing
    /// order. A pod no node can take is left `Pending`; that is not an error.
    /// Only store failures are returned as errors.
    pub async fn schedule_pod(&self, pod: &mut Pod) -> Result<()> {
        let nodes = self.repo.list_nodes().await?;

        for candidate in nodes {
            if !fits(&candidate.value, pod) {
                continue;
            }
            if let Some(node) = self.commit_reservation(candidate, pod).await? {
                pod.node_id = node.id;
                pod.status = PodStatus::Scheduled;
                info!(
                    pod_id=%pod.id,
                    node_id=%pod.node_id,
                    cpu=pod.resources.cpu,
                    memory=pod.resources.memory,
                    "pod scheduled"
                );
                return Ok(());
            }
        }

        pod.node_id.clear();
        pod.status = PodStatus::Pending;
        info!(pod_id=%pod.id, "no node satisfies the pod's constraints, leaving it pending");
        Ok(())
    }

    /// Try to add the pod's resources to the node. Returns the committed node, or
    /// `None` when the node stopped fitting (or vanished) under contention.
    async fn commit_reservation(
        &self,
        mut seen: Versioned<Node>,
        pod: &Pod,
    ) -> Result<Option<Node>> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let mut node = seen.value.clone();
            node.reserve(&pod.resources);
            if self.repo.swap_node(&node, seen.revision).await? {
                return Ok(Some(node));
            }

            debug!(pod_id=%pod.id, node_id=%node.id, "node changed while scheduling, re-evaluating");
            seen = match self.repo.get_node(&node.id).await {
                Ok(v) => v,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };
            if !fits(&seen.value, pod) {
                return Ok(None);
            }
        }

        Err(Error::store(anyhow::anyhow!(
            "node {} kept changing, gave up after {MAX_COMMIT_ATTEMPTS} attempts",
            seen.value.id
        )))
    }

    /// Return a deleted pod's resources to its node. Pods that were never placed
    /// and nodes that no longer exist are ignored.
    pub async fn release_pod(&self, pod: &Pod) -> Result<()> {
        if pod.node_id.is_empty() {
            return Ok(());
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let seen = match self.repo.get_node(&pod.node_id).await {
                Ok(v) => v,
                Err(e) if e.is_not_found() => {
                    warn!(pod_id=%pod.id, node_id=%pod.node_id, "node gone, nothing to release");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let mut node = seen.value;
            node.release(&pod.resources);
            if self.repo.swap_node(&node, seen.revision).await? {
                debug!(pod_id=%pod.id, node_id=%node.id, "released pod resources");
                return Ok(());
            }
        }

        Err(Error::store(anyhow::anyhow!(
            "node {} kept changing, could not release resources of pod {}",
            pod.node_id,
            pod.id
        )))
    }
}
