// src/discovery/mod.rs
mod host;

pub use host::{discover_hostname, discover_lan_ip};
