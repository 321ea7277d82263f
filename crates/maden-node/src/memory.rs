use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::runtime::{ContainerRuntime, ContainerState, LogStream};

#[derive(Debug, Clone)]
struct MemoryContainer {
    image: String,
    state: ContainerState,
    logs: Vec<Bytes>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    containers: DashMap<String, MemoryContainer>,
    fail_create: Mutex<HashSet<String>>,
    fail_start: Mutex<HashSet<String>>,
}

/// In-process container runtime. Containers only change state; nothing is executed.
///
/// Create/start failures can be injected per image to exercise error paths.
#[derive(Clone, Default)]
pub struct MemoryRuntime {
    inner: Arc<Inner>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_for(&self, image: impl Into<String>) {
        lock(&self.inner.fail_create).insert(image.into());
    }

    pub fn fail_start_for(&self, image: impl Into<String>) {
        lock(&self.inner.fail_start).insert(image.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.inner.fail_create).clear();
        lock(&self.inner.fail_start).clear();
    }

    /// Force a container into `state`, e.g. to simulate a crash.
    pub fn set_state(&self, id: &str, state: ContainerState) -> bool {
        match self.inner.containers.get_mut(id) {
            Some(mut c) => {
                c.state = state;
                true
            }
            None => false,
        }
    }

    pub fn state_of(&self, id: &str) -> Option<ContainerState> {
        self.inner.containers.get(id).map(|c| c.state)
    }

    pub fn image_of(&self, id: &str) -> Option<String> {
        self.inner.containers.get(id).map(|c| c.image.clone())
    }

    pub fn push_log(&self, id: &str, line: impl Into<Bytes>) -> bool {
        match self.inner.containers.get_mut(id) {
            Some(mut c) => {
                c.logs.push(line.into());
                true
            }
            None => false,
        }
    }

    pub fn container_count(&self) -> usize {
        self.inner.containers.len()
    }

    fn with_container<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut MemoryContainer) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut entry = self
            .inner
            .containers
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("no such container: {id}"))?;
        f(entry.value_mut())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn create_container(&self, image: &str) -> anyhow::Result<String> {
        if lock(&self.inner.fail_create).contains(image) {
            anyhow::bail!("image {image} cannot be created");
        }
        let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("mem-{n:08x}");
        self.inner.containers.insert(
            id.clone(),
            MemoryContainer {
                image: image.to_string(),
                state: ContainerState::Created,
                logs: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        let fail_start = lock(&self.inner.fail_start).clone();
        self.with_container(id, |c| {
            if fail_start.contains(&c.image) {
                c.state = ContainerState::Exited;
                anyhow::bail!("container {id} exited on start");
            }
            c.state = ContainerState::Running;
            Ok(())
        })
    }

    async fn stop_container(&self, id: &str) -> anyhow::Result<()> {
        self.with_container(id, |c| {
            c.state = ContainerState::Exited;
            Ok(())
        })
    }

    async fn delete_container(&self, id: &str) -> anyhow::Result<()> {
        self.inner
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("no such container: {id}"))
    }

    async fn container_status(&self, id: &str) -> anyhow::Result<ContainerState> {
        self.with_container(id, |c| Ok(c.state))
    }

    async fn container_logs(&self, id: &str, _follow: bool) -> anyhow::Result<LogStream> {
        let chunks = self.with_container(id, |c| Ok(c.logs.clone()))?;
        Ok(Box::pin(tokio_stream::iter(
            chunks.into_iter().map(Ok::<_, std::io::Error>),
        )))
    }

    async fn exec(&self, id: &str, command: &str) -> anyhow::Result<String> {
        self.with_container(id, |c| {
            if c.state != ContainerState::Running {
                anyhow::bail!("container {id} is not running");
            }
            Ok(format!("{command}\n"))
        })
    }
}
