// config/mod.rs
mod types;

pub use types::{PkiConfig, DEFAULT_SERVICE_IP};
