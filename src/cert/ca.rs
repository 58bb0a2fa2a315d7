// src/cert/ca.rs
use super::{
    encoding::{decode_certificate_chain, decode_key, encode_certificate, encode_key},
    CaSubject, KeyPair, PkiError, Signer,
};
use crate::utils::fs::{read_file, StagedFile, PRIVATE_MODE, PUBLIC_MODE};
use openssl::{
    asn1::{Asn1Time, Asn1Type},
    bn::BigNum,
    nid::Nid,
    x509::{
        extension::{BasicConstraints, KeyUsage, SubjectAlternativeName, SubjectKeyIdentifier},
        X509Name, X509,
    },
};
use std::path::{Path, PathBuf};

pub const X509_VERSION_3: i32 = 2;
pub const CA_VALIDITY_DAYS: u32 = 3650;

pub struct CertificateAuthority {
    pub name: String,
    pub certificate: X509,
    pub key: KeyPair,
}

/// On-disk base name for a CA. The etcd CA lives in its own subdirectory and
/// downstream paths (etcd/all, etcd/peer) rely on that.
pub fn ca_base_name(name: &str) -> &str {
    match name {
        "etcd-ca" => "etcd/ca",
        other => other,
    }
}

/// Entries are written as UTF8String with an explicit type, which skips the
/// 64-byte common-name bound. Node names embed the hostname and can exceed it.
pub(crate) fn subject_name(common_name: &str, organization: &[String]) -> Result<X509Name, PkiError> {
    let mut name = X509Name::builder()?;
    for org in organization {
        name.append_entry_by_nid_with_type(Nid::ORGANIZATIONNAME, org, Asn1Type::UTF8STRING)?;
    }
    name.append_entry_by_nid_with_type(Nid::COMMONNAME, common_name, Asn1Type::UTF8STRING)?;
    Ok(name.build())
}

/// Self-signed CA certificate: serial 0, ten years from now, CA + CertSign.
pub fn create_self_signed(subject: &CaSubject, key: &dyn Signer) -> Result<X509, PkiError> {
    let pkey = key.signing_key()?;
    let name = subject_name(&subject.common_name, &subject.organization)?;

    let mut builder = X509::builder()?;
    builder.set_version(X509_VERSION_3)?;
    let serial = BigNum::from_u32(0)?.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&pkey)?;
    let not_before = Asn1Time::days_from_now(0)?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::days_from_now(CA_VALIDITY_DAYS)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .key_cert_sign()
            .build()?,
    )?;
    let key_id = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(key_id)?;
    let alt_names = SubjectAlternativeName::new()
        .dns(&subject.common_name)
        .build(&builder.x509v3_context(None, None))?;
    builder.append_extension(alt_names)?;

    builder.sign(&pkey, key.digest())?;
    Ok(X509::from_der(&builder.build().to_der()?)?)
}

pub struct CaStore {
    pki_dir: PathBuf,
}

impl CaStore {
    pub fn new(pki_dir: impl Into<PathBuf>) -> Self {
        Self {
            pki_dir: pki_dir.into(),
        }
    }

    pub fn pki_dir(&self) -> &Path {
        &self.pki_dir
    }

    pub fn cert_path(&self, base_name: &str) -> PathBuf {
        self.pki_dir.join(format!("{}.crt", base_name))
    }

    pub fn key_path(&self, base_name: &str) -> PathBuf {
        self.pki_dir.join(format!("{}.key", base_name))
    }

    pub fn load(&self, name: &str) -> Result<CertificateAuthority, PkiError> {
        let base_name = ca_base_name(name);
        let cert_path = self.cert_path(base_name);

        let cert_data = read_file(&cert_path)?;
        let certificate = decode_certificate_chain(&cert_data)
            .and_then(|mut chain| chain.next().unwrap_or(Err(PkiError::EmptyCertificateChain)))
            .map_err(|e| PkiError::invalid_ca(name, e))?;

        let key_data = read_file(&self.key_path(base_name))?;
        let key = decode_key(&key_data).map_err(|e| PkiError::invalid_ca(name, e))?;

        let cert_key = certificate.public_key()?;
        let signing_key = key.signing_key()?;
        if !cert_key.public_eq(&signing_key) {
            return Err(PkiError::invalid_ca(
                name,
                PkiError::VerificationFailed {
                    path: cert_path,
                    reason: "private key does not match certificate".to_string(),
                },
            ));
        }

        Ok(CertificateAuthority {
            name: name.to_string(),
            certificate,
            key,
        })
    }

    pub fn persist(&self, name: &str, cert: &X509, key: &KeyPair) -> Result<(), PkiError> {
        self.write_cert_and_key(ca_base_name(name), cert, key)
    }

    /// Both files are staged before either is renamed into place. A crash
    /// between the two renames can still leave a new key next to an old
    /// certificate; rerunning `certs` repairs it.
    pub fn write_cert_and_key(
        &self,
        base_name: &str,
        cert: &X509,
        key: &KeyPair,
    ) -> Result<(), PkiError> {
        let staged_key = StagedFile::stage(&self.key_path(base_name), &encode_key(key)?, PRIVATE_MODE)?;
        let staged_cert = match encode_certificate(cert).and_then(|pem| {
            StagedFile::stage(&self.cert_path(base_name), &pem, PUBLIC_MODE)
        }) {
            Ok(staged) => staged,
            Err(e) => {
                staged_key.discard();
                return Err(e);
            }
        };

        if let Err(e) = staged_key.commit() {
            staged_cert.discard();
            return Err(e);
        }
        staged_cert.commit()
    }

    /// Generates a key, self-signs it and writes both files.
    pub fn create(
        &self,
        name: &str,
        subject: &CaSubject,
        key: KeyPair,
    ) -> Result<CertificateAuthority, PkiError> {
        let certificate = create_self_signed(subject, &key)?;
        self.persist(name, &certificate, &key)?;
        Ok(CertificateAuthority {
            name: name.to_string(),
            certificate,
            key,
        })
    }
}
