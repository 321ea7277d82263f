pub mod docker;
pub mod lifecycle;
pub mod memory;
pub mod runtime;

pub use docker::DockerCliRuntime;
pub use lifecycle::{PodLifecycleManager, PodManager};
pub use memory::MemoryRuntime;
pub use runtime::{ContainerRuntime, ContainerState, LogStream};
