use rand::distributions::Alphanumeric;
use rand::Rng;

/// Short lowercase alphanumeric id used for deployments and services.
pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Globally unique id for pods.
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
