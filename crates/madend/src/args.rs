use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Memory,
    Etcd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuntimeKind {
    Docker,
    Memory,
}

/// Maden control plane and node agent in one process.
#[derive(Debug, Parser)]
#[command(name = "madend", version)]
pub struct Args {
    #[arg(long, value_enum, default_value_t = StoreKind::Etcd, env = "MADEN_STORE")]
    pub store: StoreKind,

    #[arg(long, default_value = "http://127.0.0.1:2379", env = "MADEN_ETCD_ENDPOINT")]
    pub etcd_endpoint: String,

    #[arg(long, value_enum, default_value_t = RuntimeKind::Docker, env = "MADEN_RUNTIME")]
    pub runtime: RuntimeKind,

    /// Deadline for each individual store call.
    #[arg(long, default_value_t = 5_000, env = "MADEN_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    #[arg(long, default_value = "node-1", env = "MADEN_NODE_ID")]
    pub node_id: String,

    /// Defaults to the node id.
    #[arg(long, env = "MADEN_NODE_NAME")]
    pub node_name: Option<String>,

    #[arg(long, default_value_t = 4, env = "MADEN_NODE_CPU")]
    pub node_cpu: u64,

    /// Memory capacity in MB.
    #[arg(long, default_value_t = 4096, env = "MADEN_NODE_MEMORY")]
    pub node_memory: u64,

    #[arg(long = "node-label", value_parser = parse_key_val, env = "MADEN_NODE_LABELS", value_delimiter = ',')]
    pub node_labels: Vec<(String, String)>,

    #[arg(long = "node-taint", value_parser = parse_key_val, env = "MADEN_NODE_TAINTS", value_delimiter = ',')]
    pub node_taints: Vec<(String, String)>,

    /// Manifest files applied once at startup.
    #[arg(long = "apply", env = "MADEN_APPLY", value_delimiter = ',')]
    pub manifests: Vec<PathBuf>,

    #[arg(long, default_value_t = 9464, env = "MADEN_METRICS_PORT")]
    pub metrics_port: u16,

    #[arg(long, env = "MADEN_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    #[arg(long, env = "MADEN_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}

impl Args {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn node_name(&self) -> String {
        self.node_name.clone().unwrap_or_else(|| self.node_id.clone())
    }

    pub fn labels(&self) -> HashMap<String, String> {
        self.node_labels.iter().cloned().collect()
    }

    pub fn taints(&self) -> HashMap<String, String> {
        self.node_taints.iter().cloned().collect()
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if k.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((k.to_string(), v.to_string()))
}
