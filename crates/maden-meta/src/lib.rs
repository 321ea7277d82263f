pub mod etcd;
pub mod memory;
pub mod repo;
pub mod types;

pub use etcd::EtcdMetaStore;
pub use memory::MemoryMetaStore;
pub use repo::{Repository, Versioned, DEFAULT_STORE_TIMEOUT};
pub use types::{MetaStore, WatchEvent, WatchEventKind, WatchStream};
