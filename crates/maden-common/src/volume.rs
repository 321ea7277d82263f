use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::random_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessMode::ReadWriteOnce => "ReadWriteOnce",
            AccessMode::ReadOnlyMany => "ReadOnlyMany",
            AccessMode::ReadWriteMany => "ReadWriteMany",
        };
        f.write_str(s)
    }
}

/// What happens to a volume's data once its claim is released.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReclaimPolicy {
    #[default]
    Retain,
    Delete,
    Recycle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentVolumeSpec {
    pub name: String,
    /// Quantities keyed by resource, e.g. `{"storage": "10Gi"}`.
    #[serde(default)]
    pub capacity: HashMap<String, String>,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub storage_class_name: String,
    #[serde(default)]
    pub mount_options: Vec<String>,
}

/// A volume as recorded under `/persistentvolumes/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentVolume {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub capacity: HashMap<String, String>,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub storage_class_name: String,
    #[serde(default)]
    pub mount_options: Vec<String>,
}

impl PersistentVolume {
    pub fn from_spec(spec: PersistentVolumeSpec) -> Self {
        Self {
            id: random_id(10),
            name: spec.name,
            capacity: spec.capacity,
            access_modes: spec.access_modes,
            reclaim_policy: spec.reclaim_policy,
            storage_class_name: spec.storage_class_name,
            mount_options: spec.mount_options,
        }
    }

    pub fn needs_update(&self, spec: &PersistentVolumeSpec) -> bool {
        self.capacity != spec.capacity
            || self.access_modes != spec.access_modes
            || self.reclaim_policy != spec.reclaim_policy
            || self.storage_class_name != spec.storage_class_name
            || self.mount_options != spec.mount_options
    }

    pub fn apply(&mut self, spec: PersistentVolumeSpec) {
        self.capacity = spec.capacity;
        self.access_modes = spec.access_modes;
        self.reclaim_policy = spec.reclaim_policy;
        self.storage_class_name = spec.storage_class_name;
        self.mount_options = spec.mount_options;
    }

    pub fn supports(&self, modes: &[AccessMode]) -> bool {
        modes.iter().all(|m| self.access_modes.contains(m))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentVolumeClaimSpec {
    pub name: String,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    /// Requested quantities, keyed like [`PersistentVolume::capacity`].
    #[serde(default)]
    pub resources: HashMap<String, String>,
    /// Volume to bind to. Empty leaves the claim unbound.
    #[serde(default)]
    pub volume_name: String,
}

/// A claim as recorded under `/persistentvolumeclaims/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistentVolumeClaim {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub resources: HashMap<String, String>,
    #[serde(default)]
    pub volume_name: String,
}

impl PersistentVolumeClaim {
    pub fn from_spec(spec: PersistentVolumeClaimSpec) -> Self {
        Self {
            id: random_id(10),
            name: spec.name,
            access_modes: spec.access_modes,
            resources: spec.resources,
            volume_name: spec.volume_name,
        }
    }

    pub fn needs_update(&self, spec: &PersistentVolumeClaimSpec) -> bool {
        self.access_modes != spec.access_modes
            || self.resources != spec.resources
            || self.volume_name != spec.volume_name
    }

    pub fn apply(&mut self, spec: PersistentVolumeClaimSpec) {
        self.access_modes = spec.access_modes;
        self.resources = spec.resources;
        self.volume_name = spec.volume_name;
    }

    pub fn is_bound(&self) -> bool {
        !self.volume_name.is_empty()
    }
}
