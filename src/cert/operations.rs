// src/cert/operations.rs
use super::{
    ca::{ca_base_name, CaStore, CertificateAuthority},
    catalog::{CaEntry, CatalogNode, PkiCatalog},
    generate_key,
    issuer::{CertificateIssuer, IssuedCertificate},
    service_account::ServiceAccountGenerator,
    CertificateConfig, KeyAlgorithm, KeyPair, PkiError,
};
use crate::utils::logging::Logger;
use std::path::PathBuf;

/// Drives a generation pass over a catalog. The first failure stops the
/// pass; files written by earlier steps stay on disk.
pub struct CertificateOperations {
    logger: Box<dyn Logger>,
    store: CaStore,
    issuer: CertificateIssuer,
    ca_algorithm: KeyAlgorithm,
}

impl CertificateOperations {
    pub fn new(logger: Box<dyn Logger>, pki_dir: impl Into<PathBuf>, ca_algorithm: KeyAlgorithm) -> Self {
        Self {
            logger,
            store: CaStore::new(pki_dir),
            issuer: CertificateIssuer::default(),
            ca_algorithm,
        }
    }

    pub fn log(&mut self, message: &str) {
        self.logger.log(message);
    }

    pub fn store(&self) -> &CaStore {
        &self.store
    }

    pub fn load_authority(&mut self, name: &str) -> Result<CertificateAuthority, PkiError> {
        self.logger.debug_log(&format!(
            "Loading CA {} from {}",
            name,
            self.store.pki_dir().display()
        ));
        self.store.load(name)
    }

    /// Signs `spec` with an already loaded CA without touching the disk.
    pub fn issue(
        &mut self,
        spec: &CertificateConfig,
        ca: &CertificateAuthority,
    ) -> Result<IssuedCertificate, PkiError> {
        self.logger.debug_log(&format!(
            "Issuing {} (CN={}) from {}",
            spec.base_name, spec.common_name, ca.name
        ));
        self.issuer.issue(spec, ca)
    }

    pub fn create_authority(&mut self, entry: &CaEntry) -> Result<CertificateAuthority, PkiError> {
        self.logger.log(&format!("Creating CA {}", entry.name));
        let key = generate_key(self.ca_algorithm)?;
        let ca = self.store.create(&entry.name, &entry.subject, key)?;
        self.logger.debug_log(&format!(
            "Wrote {}",
            self.store.cert_path(ca_base_name(&entry.name)).display()
        ));
        Ok(ca)
    }

    pub fn issue_leaf(&mut self, spec: &CertificateConfig) -> Result<IssuedCertificate, PkiError> {
        self.logger.log(&format!("Generating certificate for {}", spec.base_name));
        let ca = self.load_authority(&spec.ca_name)?;
        let issued = self.issue(spec, &ca)?;
        self.store
            .write_cert_and_key(&spec.base_name, &issued.certificate, &issued.key)?;
        self.logger.debug_log(&format!(
            "Wrote {}",
            self.store.cert_path(&spec.base_name).display()
        ));
        Ok(issued)
    }

    /// Creates every authority, then issues every leaf.
    pub fn run_catalog(&mut self, catalog: &PkiCatalog) -> Result<(), PkiError> {
        let plan = catalog.plan()?;
        self.logger.log(&format!(
            "Generating {} authorities and {} certificates",
            catalog.authorities().len(),
            catalog.leaves().len()
        ));

        for node in plan {
            let result = match node {
                CatalogNode::Authority(entry) => self.create_authority(entry).map(|_| ()),
                CatalogNode::Leaf(spec) => self.issue_leaf(spec).map(|_| ()),
            };
            if let Err(e) = result {
                self.logger.log(&format!("Certificate generation failed: {}", e));
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn generate_service_account_keys(&mut self) -> Result<KeyPair, PkiError> {
        ServiceAccountGenerator::new(self.store.pki_dir())
            .generate_service_account_keys(self.logger.as_mut())
    }

    /// Catalog pass followed by the service-account keypair.
    pub fn generate_all(&mut self, catalog: &PkiCatalog) -> Result<(), PkiError> {
        self.run_catalog(catalog)?;
        self.generate_service_account_keys()?;
        self.logger.log("PKI generation complete");
        Ok(())
    }
}
