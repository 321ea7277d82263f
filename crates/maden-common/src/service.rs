use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::random_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePort {
    pub port: u16,
    pub target_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default)]
    pub selector: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// A service as recorded under `/services/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub selector: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    /// Virtual IP, assigned by the networking layer when one is running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl Service {
    pub fn from_spec(spec: ServiceSpec) -> Self {
        Self {
            id: random_id(10),
            name: spec.name,
            selector: spec.selector,
            ports: spec.ports,
            ip: None,
        }
    }

    pub fn needs_update(&self, spec: &ServiceSpec) -> bool {
        self.selector != spec.selector || self.ports != spec.ports
    }

    pub fn apply(&mut self, spec: ServiceSpec) {
        self.selector = spec.selector;
        self.ports = spec.ports;
    }
}
