use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

/// Raw container output, chunked as the engine produces it.
pub type LogStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Container states as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl FromStr for ContainerState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(ContainerState::Created),
            "running" => Ok(ContainerState::Running),
            "paused" => Ok(ContainerState::Paused),
            "restarting" => Ok(ContainerState::Restarting),
            "removing" => Ok(ContainerState::Removing),
            "exited" => Ok(ContainerState::Exited),
            "dead" => Ok(ContainerState::Dead),
            other => anyhow::bail!("unknown container state: {other:?}"),
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Container engine driver used by the node agent.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container from `image` and return its engine id.
    async fn create_container(&self, image: &str) -> anyhow::Result<String>;

    async fn start_container(&self, id: &str) -> anyhow::Result<()>;

    async fn stop_container(&self, id: &str) -> anyhow::Result<()>;

    async fn delete_container(&self, id: &str) -> anyhow::Result<()>;

    async fn container_status(&self, id: &str) -> anyhow::Result<ContainerState>;

    /// Stream stdout/stderr. With `follow` the stream stays open until the
    /// container exits.
    async fn container_logs(&self, id: &str, follow: bool) -> anyhow::Result<LogStream>;

    /// Run `command` through a shell inside the container and collect its output.
    async fn exec(&self, id: &str, command: &str) -> anyhow::Result<String>;
}
