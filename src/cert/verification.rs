// src/cert/verification.rs
use super::{
    catalog::PkiCatalog, ca::CaStore, encoding::decode_certificate_chain, PkiError,
};
use crate::utils::{fs::read_file, logging::Logger};
use chrono::{DateTime, TimeZone, Utc};
use openssl::{
    hash::MessageDigest,
    stack::Stack,
    x509::{store::X509StoreBuilder, X509StoreContext, X509},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use x509_parser::prelude::{FromDer, X509Certificate, ASN1Time};

/// Summary of one certificate found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    pub path: PathBuf,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub fingerprint: String,
    pub is_ca: bool,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Returns the verifier's reason string when `leaf` does not chain to `ca`.
fn chain_failure(leaf: &X509, ca: &X509) -> Result<Option<String>, PkiError> {
    let mut builder = X509StoreBuilder::new()?;
    builder.add_cert(ca.clone())?;
    let store = builder.build();
    let intermediates = Stack::<X509>::new()?;

    let mut context = X509StoreContext::new()?;
    let (verified, result) = context.init(&store, leaf, &intermediates, |ctx| {
        let verified = ctx.verify_cert()?;
        Ok((verified, ctx.error()))
    })?;

    Ok((!verified).then(|| result.error_string().to_string()))
}

/// Standard chain verification with `ca` as the only trust anchor.
pub fn verify_chain(leaf: &X509, ca: &X509) -> Result<(), PkiError> {
    match chain_failure(leaf, ca)? {
        None => Ok(()),
        Some(reason) => Err(PkiError::VerificationFailed {
            path: PathBuf::from(subject_label(leaf)),
            reason,
        }),
    }
}

fn subject_label(cert: &X509) -> String {
    cert.subject_name()
        .entries()
        .last()
        .and_then(|entry| std::str::from_utf8(entry.data().as_slice()).ok())
        .map(str::to_string)
        .unwrap_or_else(|| "<unnamed>".to_string())
}

fn first_certificate(path: &Path) -> Result<X509, PkiError> {
    let data = read_file(path)?;
    decode_certificate_chain(&data)?
        .next()
        .unwrap_or(Err(PkiError::EmptyCertificateChain))
}

fn to_utc(time: ASN1Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn inspect(path: &Path) -> Result<CertificateInfo, PkiError> {
    let cert = first_certificate(path)?;
    let fingerprint = hex::encode(cert.digest(MessageDigest::sha256())?);
    let der = cert.to_der()?;
    let (_, parsed) = X509Certificate::from_der(&der).map_err(|e| {
        PkiError::VerificationFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    Ok(CertificateInfo {
        path: path.to_path_buf(),
        subject: parsed.subject().to_string(),
        issuer: parsed.issuer().to_string(),
        serial: hex::encode(parsed.raw_serial()),
        fingerprint,
        is_ca: parsed.is_ca(),
        not_before: to_utc(parsed.validity().not_before),
        not_after: to_utc(parsed.validity().not_after),
    })
}

pub struct CertificateVerifier {
    logger: Box<dyn Logger>,
    store: CaStore,
}

impl CertificateVerifier {
    pub fn new(logger: Box<dyn Logger>, pki_dir: impl Into<PathBuf>) -> Self {
        Self {
            logger,
            store: CaStore::new(pki_dir),
        }
    }

    /// Verifies every catalog leaf against its CA. Returns the number of
    /// leaves checked.
    pub fn verify_catalog(&mut self, catalog: &PkiCatalog) -> Result<usize, PkiError> {
        catalog.validate()?;
        self.logger.log("Verifying certificate chains...");

        let mut checked = 0;
        for leaf in catalog.leaves() {
            let path = self.store.cert_path(&leaf.base_name);
            self.logger
                .debug_log(&format!("Checking {} against {}", path.display(), leaf.ca_name));

            let ca = self.store.load(&leaf.ca_name)?;
            let cert = first_certificate(&path).map_err(|e| PkiError::VerificationFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

            if let Some(reason) = chain_failure(&cert, &ca.certificate)? {
                self.logger
                    .log(&format!("✗ {}: {}", path.display(), reason));
                return Err(PkiError::VerificationFailed { path, reason });
            }
            self.logger.log(&format!("✓ {}", path.display()));
            checked += 1;
        }

        Ok(checked)
    }

    /// Every `*.crt` below the PKI directory, in path order.
    pub fn discover(&mut self) -> Result<Vec<CertificateInfo>, PkiError> {
        let pattern = self.store.pki_dir().join("**").join("*.crt");
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern)
            .map_err(|e| PkiError::InvalidConfig(format!("bad glob pattern {}: {}", pattern, e)))?;

        let mut found = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                PkiError::io(&path, e.into())
            })?;
            self.logger
                .debug_log(&format!("Inspecting {}", path.display()));
            found.push(inspect(&path)?);
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));

        self.logger
            .log(&format!("Found {} certificates", found.len()));
        Ok(found)
    }
}
