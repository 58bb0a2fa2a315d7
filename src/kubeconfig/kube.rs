// src/kubeconfig/kube.rs
use super::AccessBundle;
use crate::cert::PkiError;
use crate::utils::fs::{write_atomic, PRIVATE_MODE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    pub users: Vec<NamedUser>,
    pub current_context: String,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub certificate_authority_data: String,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub cluster: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    pub client_certificate_data: String,
    pub client_key_data: String,
}

impl KubeConfig {
    pub fn to_yaml(&self) -> Result<String, PkiError> {
        serde_yaml::to_string(self).map_err(|e| PkiError::Encode(e.to_string()))
    }

    #[cfg(test)]
    pub fn from_yaml(data: &str) -> Result<Self, PkiError> {
        serde_yaml::from_str(data).map_err(|e| PkiError::Encode(e.to_string()))
    }
}

pub struct KubeConfigGenerator {
    output_dir: PathBuf,
}

impl KubeConfigGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn to_kubeconfig(bundle: &AccessBundle) -> KubeConfig {
        KubeConfig {
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            clusters: vec![NamedCluster {
                name: bundle.cluster_name.clone(),
                cluster: Cluster {
                    certificate_authority_data: STANDARD.encode(&bundle.ca_certificate),
                    server: bundle.server.clone(),
                },
            }],
            contexts: vec![NamedContext {
                name: bundle.context_name.clone(),
                context: Context {
                    cluster: bundle.cluster_name.clone(),
                    user: bundle.client_name.clone(),
                },
            }],
            users: vec![NamedUser {
                name: bundle.client_name.clone(),
                user: User {
                    client_certificate_data: STANDARD.encode(&bundle.client_certificate),
                    client_key_data: STANDARD.encode(&bundle.client_key),
                },
            }],
            current_context: bundle.context_name.clone(),
            preferences: BTreeMap::new(),
        }
    }

    /// Writes the bundle as `<output_dir>/<file_name>`, readable by the
    /// owner only. Returns the written path.
    pub fn write(&self, bundle: &AccessBundle, file_name: &str) -> Result<PathBuf, PkiError> {
        let path = self.output_dir.join(file_name);
        let yaml = Self::to_kubeconfig(bundle).to_yaml()?;
        write_atomic(&path, yaml.as_bytes(), PRIVATE_MODE)?;
        Ok(path)
    }
}
