//! Key layout of the metadata store.

pub const NODES_PREFIX: &str = "/nodes/";
pub const PODS_PREFIX: &str = "/pods/";
pub const DEPLOYMENTS_PREFIX: &str = "/deployments/";
pub const SERVICES_PREFIX: &str = "/services/";
pub const VOLUMES_PREFIX: &str = "/persistentvolumes/";
pub const CLAIMS_PREFIX: &str = "/persistentvolumeclaims/";

pub fn node_key(node_id: &str) -> String {
    format!("{NODES_PREFIX}{node_id}")
}

pub fn pod_key(pod_id: &str) -> String {
    format!("{PODS_PREFIX}{pod_id}")
}

/// Deployments are keyed by name so incoming specs can be matched without a lookup table.
pub fn deployment_key(name: &str) -> String {
    format!("{DEPLOYMENTS_PREFIX}{name}")
}

pub fn service_key(name: &str) -> String {
    format!("{SERVICES_PREFIX}{name}")
}

pub fn volume_key(name: &str) -> String {
    format!("{VOLUMES_PREFIX}{name}")
}

pub fn claim_key(name: &str) -> String {
    format!("{CLAIMS_PREFIX}{name}")
}
