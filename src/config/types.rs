// config/types.rs
use crate::cert::{KeyAlgorithm, PkiError};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};
use url::Url;

pub const DEFAULT_SERVICE_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 96, 0, 1));
pub const API_SERVER_PORT: u16 = 6443;
pub const DEFAULT_CLUSTER_NAME: &str = "kubernetes";

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

/// Everything the engine needs from the host, gathered once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PkiConfig {
    pub pki_dir: PathBuf,
    pub kubeconfig_dir: PathBuf,
    pub service_ip: IpAddr,
    pub lan_ip: IpAddr,
    pub api_server: String,
    pub hostname: String,
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl PkiConfig {
    /// Standard kubeadm layout below `root_dir`: `etc/kubernetes` for
    /// kubeconfigs and `etc/kubernetes/pki` for key material.
    pub fn new(root_dir: &str, hostname: &str, lan_ip: IpAddr) -> Self {
        let kubeconfig_dir = expand(root_dir).join("etc").join("kubernetes");
        Self {
            pki_dir: kubeconfig_dir.join("pki"),
            kubeconfig_dir,
            service_ip: DEFAULT_SERVICE_IP,
            lan_ip,
            api_server: Self::default_api_server(lan_ip),
            hostname: hostname.to_string(),
            cluster_name: default_cluster_name(),
            key_algorithm: KeyAlgorithm::default(),
        }
    }

    pub fn default_api_server(lan_ip: IpAddr) -> String {
        format!("https://{}", SocketAddr::new(lan_ip, API_SERVER_PORT))
    }

    pub fn with_service_ip(mut self, service_ip: IpAddr) -> Self {
        self.service_ip = service_ip;
        self
    }

    pub fn with_api_server(mut self, api_server: &str) -> Self {
        self.api_server = api_server.to_string();
        self
    }

    pub fn with_key_algorithm(mut self, key_algorithm: KeyAlgorithm) -> Self {
        self.key_algorithm = key_algorithm;
        self
    }

    pub fn load_from_file(path: &Path) -> Result<Self, PkiError> {
        let config_str = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PkiError::MissingFile(path.to_path_buf()),
            _ => PkiError::io(path, e),
        })?;
        let mut config: Self = serde_json::from_str(&config_str)
            .map_err(|e| PkiError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        config.pki_dir = expand(&config.pki_dir.to_string_lossy());
        config.kubeconfig_dir = expand(&config.kubeconfig_dir.to_string_lossy());
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), PkiError> {
        let config_str =
            serde_json::to_string_pretty(self).map_err(|e| PkiError::Encode(e.to_string()))?;
        fs::write(path, config_str).map_err(|e| PkiError::io(path, e))
    }

    pub fn validate(&self) -> Result<(), PkiError> {
        if self.hostname.trim().is_empty() {
            return Err(PkiError::InvalidConfig("hostname is empty".to_string()));
        }
        if self.lan_ip.is_unspecified() {
            return Err(PkiError::InvalidConfig(format!(
                "LAN address {} is not usable",
                self.lan_ip
            )));
        }

        let url = Url::parse(&self.api_server).map_err(|e| {
            PkiError::InvalidConfig(format!("API server URL '{}': {}", self.api_server, e))
        })?;
        if url.scheme() != "https" || url.host().is_none() {
            return Err(PkiError::InvalidConfig(format!(
                "API server URL '{}' must be an https URL with a host",
                self.api_server
            )));
        }
        Ok(())
    }
}
