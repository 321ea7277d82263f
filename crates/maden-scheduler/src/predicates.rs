use maden_common::{Node, NodeStatus, Pod};

/// Every affinity pair must be present on the node with the same value.
pub fn matches_affinity(node: &Node, pod: &Pod) -> bool {
    pod.affinity
        .iter()
        .all(|(k, v)| node.labels.get(k) == Some(v))
}

/// No anti-affinity pair may be present on the node with the same value.
pub fn matches_anti_affinity(node: &Node, pod: &Pod) -> bool {
    pod.anti_affinity
        .iter()
        .all(|(k, v)| node.labels.get(k) != Some(v))
}

/// Every node taint must be tolerated with the exact same value.
pub fn tolerates_taints(node: &Node, pod: &Pod) -> bool {
    node.taints
        .iter()
        .all(|(k, v)| pod.tolerations.get(k) == Some(v))
}

/// Full predicate set a node must pass to receive the pod.
pub fn fits(node: &Node, pod: &Pod) -> bool {
    node.status == NodeStatus::Ready
        && node.has_room_for(&pod.resources)
        && matches_affinity(node, pod)
        && matches_anti_affinity(node, pod)
        && tolerates_taints(node, pod)
}
