// src/cert/catalog.rs
//
// The fixed set of authorities and leaf certificates a control plane needs.
// Leaves point at their issuing authority by name; `validate` checks those
// edges before anything is generated.
use super::{
    ca::ca_base_name, AltNames, CaSubject, CertificateConfig, ExtendedUsage, PkiError,
};
use crate::config::PkiConfig;
use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

pub const ROOT_CA: &str = "ca";
pub const ETCD_CA: &str = "etcd-ca";
pub const FRONT_PROXY_CA: &str = "front-proxy-ca";

/// Organization granting cluster-admin through the default RBAC bindings.
pub const MASTERS_GROUP: &str = "system:masters";

const IN_CLUSTER_NAMES: [&str; 5] = [
    "localhost",
    "kubernetes",
    "kubernetes.default",
    "kubernetes.default.svc",
    "kubernetes.default.svc.cluster.local",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaEntry {
    pub name: String,
    pub subject: CaSubject,
}

impl CaEntry {
    pub fn new(name: &str, common_name: &str) -> Self {
        Self {
            name: name.to_string(),
            subject: CaSubject::new(common_name),
        }
    }
}

/// One step of a generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogNode<'a> {
    Authority(&'a CaEntry),
    Leaf(&'a CertificateConfig),
}

#[derive(Debug, Clone, Default)]
pub struct PkiCatalog {
    authorities: Vec<CaEntry>,
    leaves: Vec<CertificateConfig>,
}

impl PkiCatalog {
    pub fn new(authorities: Vec<CaEntry>, leaves: Vec<CertificateConfig>) -> Self {
        Self {
            authorities,
            leaves,
        }
    }

    /// Authorities and leaves for a single control-plane node.
    pub fn kubernetes(config: &PkiConfig) -> Self {
        let host = config.hostname.as_str();
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let lan = config.lan_ip;
        let both = [ExtendedUsage::ServerAuth, ExtendedUsage::ClientAuth];

        let mut apiserver_dns = vec![host];
        apiserver_dns.extend(IN_CLUSTER_NAMES);

        let leaves = vec![
            CertificateConfig::new(ETCD_CA, host, "etcd/all")
                .alt_names(AltNames::new(&["localhost", host], &[loopback, lan]))
                .usages(&both),
            CertificateConfig::new(ROOT_CA, "kube-apiserver", "apiserver")
                .alt_names(AltNames::new(
                    &apiserver_dns,
                    &[loopback, lan, config.service_ip],
                ))
                .usages(&[ExtendedUsage::ServerAuth]),
            CertificateConfig::new(
                ROOT_CA,
                "kube-apiserver-kubelet-client",
                "apiserver-kubelet-client",
            )
            .organization(&[MASTERS_GROUP])
            .usages(&[ExtendedUsage::ClientAuth]),
            CertificateConfig::new(FRONT_PROXY_CA, "front-proxy-client", "front-proxy-client")
                .organization(&[MASTERS_GROUP])
                .usages(&[ExtendedUsage::ClientAuth]),
            CertificateConfig::new(ETCD_CA, host, "etcd/peer")
                .organization(&[MASTERS_GROUP])
                .alt_names(AltNames::new(
                    &["localhost", host],
                    &[loopback, lan, IpAddr::V6(Ipv6Addr::LOCALHOST)],
                ))
                .usages(&both),
        ];

        Self::new(
            vec![
                CaEntry::new(ROOT_CA, "kubernetes"),
                CaEntry::new(ETCD_CA, "etcd-ca"),
                CaEntry::new(FRONT_PROXY_CA, "front-proxy-ca"),
            ],
            leaves
                .into_iter()
                .map(|leaf| leaf.algorithm(config.key_algorithm))
                .collect(),
        )
    }

    pub fn authorities(&self) -> &[CaEntry] {
        &self.authorities
    }

    pub fn leaves(&self) -> &[CertificateConfig] {
        &self.leaves
    }

    pub fn authority(&self, name: &str) -> Option<&CaEntry> {
        self.authorities.iter().find(|ca| ca.name == name)
    }

    /// Signed-by edges as (leaf base name, CA name).
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.leaves
            .iter()
            .map(|leaf| (leaf.base_name.as_str(), leaf.ca_name.as_str()))
    }

    pub fn validate(&self) -> Result<(), PkiError> {
        let mut names = HashSet::new();
        let mut paths = HashSet::new();

        for ca in &self.authorities {
            if !names.insert(ca.name.as_str()) {
                return Err(PkiError::DuplicateEntry(format!("CA '{}'", ca.name)));
            }
            if !paths.insert(ca_base_name(&ca.name)) {
                return Err(PkiError::DuplicateEntry(format!(
                    "output path '{}'",
                    ca_base_name(&ca.name)
                )));
            }
        }

        for (leaf, ca) in self.edges() {
            if !names.contains(ca) {
                return Err(PkiError::UnknownIssuer {
                    leaf: leaf.to_string(),
                    ca: ca.to_string(),
                });
            }
            if !paths.insert(leaf) {
                return Err(PkiError::DuplicateEntry(format!("output path '{}'", leaf)));
            }
        }

        Ok(())
    }

    /// Execution order: every authority, then every leaf, each in catalog
    /// order. Fails if the graph does not validate.
    pub fn plan(&self) -> Result<Vec<CatalogNode<'_>>, PkiError> {
        self.validate()?;
        Ok(self
            .authorities
            .iter()
            .map(CatalogNode::Authority)
            .chain(self.leaves.iter().map(CatalogNode::Leaf))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PkiConfig {
        PkiConfig::new("/", "cp-1", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)))
    }

    fn leaf<'a>(catalog: &'a PkiCatalog, base_name: &str) -> &'a CertificateConfig {
        catalog
            .leaves()
            .iter()
            .find(|l| l.base_name == base_name)
            .unwrap()
    }

    #[test]
    fn kubernetes_catalog_validates() {
        let catalog = PkiCatalog::kubernetes(&config());
        assert!(catalog.validate().is_ok());

        let names: Vec<&str> = catalog.authorities().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ca", "etcd-ca", "front-proxy-ca"]);
        assert_eq!(catalog.authority("ca").unwrap().subject.common_name, "kubernetes");

        let edges: Vec<(&str, &str)> = catalog.edges().collect();
        assert_eq!(
            edges,
            vec![
                ("etcd/all", "etcd-ca"),
                ("apiserver", "ca"),
                ("apiserver-kubelet-client", "ca"),
                ("front-proxy-client", "front-proxy-ca"),
                ("etcd/peer", "etcd-ca"),
            ]
        );
    }

    #[test]
    fn plan_puts_authorities_first() {
        let catalog = PkiCatalog::kubernetes(&config());
        let plan = catalog.plan().unwrap();

        assert_eq!(plan.len(), 8);
        assert!(plan[..3]
            .iter()
            .all(|node| matches!(node, CatalogNode::Authority(_))));
        assert!(plan[3..].iter().all(|node| matches!(node, CatalogNode::Leaf(_))));
        assert!(matches!(plan[3], CatalogNode::Leaf(l) if l.base_name == "etcd/all"));
    }

    #[test]
    fn unknown_issuer_is_rejected() {
        let catalog = PkiCatalog::new(
            vec![CaEntry::new("root", "root")],
            vec![CertificateConfig::new("missing", "svc", "svc")],
        );
        match catalog.validate() {
            Err(PkiError::UnknownIssuer { leaf, ca }) => {
                assert_eq!(leaf, "svc");
                assert_eq!(ca, "missing");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(catalog.plan().is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        let catalog = PkiCatalog::new(
            vec![CaEntry::new("root", "a"), CaEntry::new("root", "b")],
            vec![],
        );
        assert!(matches!(catalog.validate(), Err(PkiError::DuplicateEntry(_))));

        let catalog = PkiCatalog::new(
            vec![CaEntry::new("root", "root")],
            vec![
                CertificateConfig::new("root", "a", "svc"),
                CertificateConfig::new("root", "b", "svc"),
            ],
        );
        assert!(matches!(catalog.validate(), Err(PkiError::DuplicateEntry(_))));

        // A leaf may not overwrite an authority's files
        let catalog = PkiCatalog::new(
            vec![CaEntry::new("etcd-ca", "etcd-ca")],
            vec![CertificateConfig::new("etcd-ca", "x", "etcd/ca")],
        );
        assert!(matches!(catalog.validate(), Err(PkiError::DuplicateEntry(_))));
    }

    #[test]
    fn apiserver_carries_service_ip_and_cluster_names() {
        let config = config().with_service_ip("10.32.0.1".parse().unwrap());
        let catalog = PkiCatalog::kubernetes(&config);
        let apiserver = leaf(&catalog, "apiserver");

        assert_eq!(apiserver.common_name, "kube-apiserver");
        assert_eq!(apiserver.usages, vec![ExtendedUsage::ServerAuth]);
        assert_eq!(
            apiserver.alt_names.dns_names,
            vec![
                "cp-1",
                "localhost",
                "kubernetes",
                "kubernetes.default",
                "kubernetes.default.svc",
                "kubernetes.default.svc.cluster.local",
            ]
        );
        assert_eq!(
            apiserver.alt_names.ips,
            vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                config.lan_ip,
                "10.32.0.1".parse::<IpAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn masters_group_mapping_is_exact() {
        let catalog = PkiCatalog::kubernetes(&config());
        let masters: Vec<&str> = catalog
            .leaves()
            .iter()
            .filter(|l| l.organization == vec![MASTERS_GROUP.to_string()])
            .map(|l| l.base_name.as_str())
            .collect();
        assert_eq!(
            masters,
            vec!["apiserver-kubelet-client", "front-proxy-client", "etcd/peer"]
        );
        assert!(leaf(&catalog, "etcd/all").organization.is_empty());
        assert!(leaf(&catalog, "apiserver").organization.is_empty());
    }

    #[test]
    fn etcd_peer_includes_ipv6_loopback() {
        let catalog = PkiCatalog::kubernetes(&config());
        let peer = leaf(&catalog, "etcd/peer");
        assert_eq!(peer.common_name, "cp-1");
        assert!(peer.alt_names.ips.contains(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(
            peer.usages,
            vec![ExtendedUsage::ServerAuth, ExtendedUsage::ClientAuth]
        );
    }

    #[test]
    fn leaves_follow_configured_algorithm() {
        let config = config().with_key_algorithm(crate::cert::KeyAlgorithm::Ecdsa);
        let catalog = PkiCatalog::kubernetes(&config);
        assert!(catalog
            .leaves()
            .iter()
            .all(|l| l.algorithm == crate::cert::KeyAlgorithm::Ecdsa));
    }
}
