// src/kubeconfig/bundle.rs
use crate::cert::{
    catalog::{MASTERS_GROUP, ROOT_CA},
    encoding::{encode_certificate, encode_key},
    CertificateAuthority, CertificateConfig, CertificateOperations, ExtendedUsage, KeyAlgorithm,
    PkiError,
};

/// A client identity that gets its own kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
    pub client_name: String,
    pub organization: Vec<String>,
    pub file_name: String,
}

impl AccessIdentity {
    pub fn new(client_name: &str, organization: &str, file_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            organization: vec![organization.to_string()],
            file_name: file_name.to_string(),
        }
    }
}

/// Administrator, the local kubelet and the control-plane components.
pub fn kubeconfig_identities(hostname: &str) -> Vec<AccessIdentity> {
    vec![
        AccessIdentity::new("kubernetes-admin", MASTERS_GROUP, "admin.conf"),
        AccessIdentity::new(
            &format!("system:node:{}", hostname),
            "system:nodes",
            "kubelet.conf",
        ),
        AccessIdentity::new(
            "system:kube-controller-manager",
            "system:kube-controller-manager",
            "controller-manager.conf",
        ),
        AccessIdentity::new(
            "system:kube-scheduler",
            "system:kube-scheduler",
            "scheduler.conf",
        ),
        AccessIdentity::new("system:kube-proxy", "system:node-proxier", "kube-proxy.conf"),
    ]
}

/// Endpoint, trust anchor and client credential for one identity. All
/// certificate and key fields hold PEM text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessBundle {
    pub cluster_name: String,
    pub server: String,
    pub ca_certificate: Vec<u8>,
    pub client_name: String,
    pub client_certificate: Vec<u8>,
    pub client_key: Vec<u8>,
    pub context_name: String,
}

pub struct AccessBundleBuilder {
    cluster_name: String,
    server: String,
    algorithm: KeyAlgorithm,
}

impl AccessBundleBuilder {
    pub fn new(cluster_name: &str, server: &str, algorithm: KeyAlgorithm) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            server: server.to_string(),
            algorithm,
        }
    }

    /// Issues a client-auth certificate for `identity` and packages it.
    pub fn build(
        &self,
        ops: &mut CertificateOperations,
        ca: &CertificateAuthority,
        identity: &AccessIdentity,
    ) -> Result<AccessBundle, PkiError> {
        let organization: Vec<&str> = identity.organization.iter().map(String::as_str).collect();
        let spec = CertificateConfig::new(&ca.name, &identity.client_name, &identity.client_name)
            .organization(&organization)
            .usages(&[ExtendedUsage::ClientAuth])
            .algorithm(self.algorithm);
        let issued = ops.issue(&spec, ca)?;

        Ok(AccessBundle {
            cluster_name: self.cluster_name.clone(),
            server: self.server.clone(),
            ca_certificate: encode_certificate(&ca.certificate)?,
            client_name: identity.client_name.clone(),
            client_certificate: encode_certificate(&issued.certificate)?,
            client_key: encode_key(&issued.key)?,
            context_name: format!("{}@{}", identity.client_name, self.cluster_name),
        })
    }

    /// Loads the root CA and builds one bundle per identity, in order.
    pub fn build_all(
        &self,
        ops: &mut CertificateOperations,
        identities: &[AccessIdentity],
    ) -> Result<Vec<AccessBundle>, PkiError> {
        let ca = ops.load_authority(ROOT_CA)?;
        identities
            .iter()
            .map(|identity| self.build(ops, &ca, identity))
            .collect()
    }
}
