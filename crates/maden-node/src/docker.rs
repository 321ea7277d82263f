use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use tokio::process::{Child, Command};
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

use crate::runtime::{ContainerRuntime, ContainerState, LogStream};

/// Drives the local Docker engine through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    bin: String,
}

impl Default for DockerCliRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = Command::new(&self.bin).args(args).output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("docker {} failed: {}", args[0], stderr.trim())
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn create_container(&self, image: &str) -> anyhow::Result<String> {
        let id = self.run(&["create", image]).await?;
        if id.is_empty() {
            anyhow::bail!("docker create returned no container id for {image}");
        }
        tracing::debug!(%image, container_id=%id, "container created");
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        self.run(&["start", id]).await.map(|_| ())
    }

    async fn stop_container(&self, id: &str) -> anyhow::Result<()> {
        self.run(&["stop", "-t", "10", id]).await.map(|_| ())
    }

    async fn delete_container(&self, id: &str) -> anyhow::Result<()> {
        self.run(&["rm", id]).await.map(|_| ())
    }

    async fn container_status(&self, id: &str) -> anyhow::Result<ContainerState> {
        self.run(&["inspect", "-f", "{{.State.Status}}", id])
            .await?
            .parse()
    }

    async fn container_logs(&self, id: &str, follow: bool) -> anyhow::Result<LogStream> {
        let mut args = vec!["logs"];
        if follow {
            args.push("-f");
        }
        args.push(id);

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("docker logs: stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("docker logs: stderr not captured"))?;

        Ok(Box::pin(ProcessOutput {
            output: Box::pin(ReaderStream::new(stdout).merge(ReaderStream::new(stderr))),
            _child: child,
        }))
    }

    async fn exec(&self, id: &str, command: &str) -> anyhow::Result<String> {
        self.run(&["exec", id, "sh", "-c", command]).await
    }
}

/// Output of a `docker logs` process. The process is killed when the stream
/// is dropped.
struct ProcessOutput {
    output: LogStream,
    _child: Child,
}

impl Stream for ProcessOutput {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.output.as_mut().poll_next(cx)
    }
}
