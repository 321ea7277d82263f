use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    Ready,
    NotReady,
    Offline,
}

/// CPU and memory amounts. Memory is in MB.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resources {
    #[serde(default)]
    pub cpu: u64,
    #[serde(default)]
    pub memory: u64,
}

impl Resources {
    pub fn new(cpu: u64, memory: u64) -> Self {
        Self { cpu, memory }
    }
}

/// A worker node as recorded under `/nodes/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub status: NodeStatus,
    pub capacity: Resources,
    #[serde(default)]
    pub used: Resources,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub taints: HashMap<String, String>,
}

impl Node {
    pub fn available(&self) -> Resources {
        Resources {
            cpu: self.capacity.cpu.saturating_sub(self.used.cpu),
            memory: self.capacity.memory.saturating_sub(self.used.memory),
        }
    }

    pub fn has_room_for(&self, req: &Resources) -> bool {
        let free = self.available();
        free.cpu >= req.cpu && free.memory >= req.memory
    }

    pub fn reserve(&mut self, req: &Resources) {
        self.used.cpu += req.cpu;
        self.used.memory += req.memory;
    }

    pub fn release(&mut self, req: &Resources) {
        self.used.cpu = self.used.cpu.saturating_sub(req.cpu);
        self.used.memory = self.used.memory.saturating_sub(req.memory);
    }
}
