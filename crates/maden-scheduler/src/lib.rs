mod predicates;
mod scheduler;

pub use predicates::{fits, matches_affinity, matches_anti_affinity, tolerates_taints};
pub use scheduler::Scheduler;
