// cert/types.rs
use super::PkiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, net::IpAddr, str::FromStr};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    #[default]
    Rsa,
    Ecdsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa => write!(f, "rsa"),
            KeyAlgorithm::Ecdsa => write!(f, "ecdsa"),
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(KeyAlgorithm::Rsa),
            "ecdsa" | "ec" => Ok(KeyAlgorithm::Ecdsa),
            other => Err(PkiError::UnsupportedKeyAlgorithm(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExtendedUsage {
    ServerAuth,
    ClientAuth,
}

/// DNS names and addresses placed in the subjectAltName extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AltNames {
    pub dns_names: Vec<String>,
    pub ips: Vec<IpAddr>,
}

impl AltNames {
    pub fn new(dns_names: &[&str], ips: &[IpAddr]) -> Self {
        Self {
            dns_names: dns_names.iter().map(|s| s.to_string()).collect(),
            ips: ips.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ips.is_empty()
    }

    /// DNS names with repeats removed, keeping first occurrence order.
    pub fn unique_dns_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.dns_names
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Subject of a self-signed authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaSubject {
    pub common_name: String,
    pub organization: Vec<String>,
}

impl CaSubject {
    pub fn new(common_name: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            organization: Vec::new(),
        }
    }
}

/// Declarative request for one leaf certificate. Carries no key material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateConfig {
    pub common_name: String,
    pub organization: Vec<String>,
    pub alt_names: AltNames,
    pub usages: Vec<ExtendedUsage>,
    pub not_after: Option<DateTime<Utc>>,
    pub algorithm: KeyAlgorithm,
    pub ca_name: String,
    pub base_name: String,
}

impl CertificateConfig {
    pub fn new(ca_name: &str, common_name: &str, base_name: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            organization: Vec::new(),
            alt_names: AltNames::default(),
            usages: Vec::new(),
            not_after: None,
            algorithm: KeyAlgorithm::Rsa,
            ca_name: ca_name.to_string(),
            base_name: base_name.to_string(),
        }
    }

    pub fn organization(mut self, organization: &[&str]) -> Self {
        self.organization = organization.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn alt_names(mut self, alt_names: AltNames) -> Self {
        self.alt_names = alt_names;
        self
    }

    pub fn usages(mut self, usages: &[ExtendedUsage]) -> Self {
        self.usages = usages.to_vec();
        self
    }

    pub fn algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn not_after(mut self, not_after: DateTime<Utc>) -> Self {
        self.not_after = Some(not_after);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_algorithms_and_rejects_others() {
        assert_eq!("RSA".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Rsa);
        assert_eq!("ecdsa".parse::<KeyAlgorithm>().unwrap(), KeyAlgorithm::Ecdsa);
        assert!(matches!(
            "dsa".parse::<KeyAlgorithm>(),
            Err(PkiError::UnsupportedKeyAlgorithm(name)) if name == "dsa"
        ));
    }

    #[test]
    fn unique_dns_names_keeps_first_occurrence() {
        let names = AltNames::new(&["b", "a", "b", "c", "a"], &[]);
        assert_eq!(names.unique_dns_names(), vec!["b", "a", "c"]);
    }
}
