// src/cert/issuer.rs
use super::{
    ca::{subject_name, CertificateAuthority, X509_VERSION_3},
    generate_key, CertificateConfig, ExtendedUsage, KeyPair, PkiError, Signer,
};
use openssl::{
    asn1::{Asn1Integer, Asn1Time},
    bn::{BigNum, MsbOption},
    x509::{
        extension::{
            AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage,
            SubjectAlternativeName, SubjectKeyIdentifier,
        },
        X509,
    },
};

pub const LEAF_VALIDITY_DAYS: u32 = 365;
const SERIAL_BITS: i32 = 128;

/// Source of leaf serial numbers. Implementations must never repeat a value
/// for the same issuing CA.
pub trait SerialSource: Send {
    fn next_serial(&mut self, ca: &CertificateAuthority) -> Result<Asn1Integer, PkiError>;
}

/// Random 128-bit serials with the top bit forced, so never 0 (the CA serial).
#[derive(Debug, Default)]
pub struct RandomSerial;

impl SerialSource for RandomSerial {
    fn next_serial(&mut self, _ca: &CertificateAuthority) -> Result<Asn1Integer, PkiError> {
        let mut serial = BigNum::new()?;
        serial.rand(SERIAL_BITS, MsbOption::ONE, false)?;
        Ok(serial.to_asn1_integer()?)
    }
}

pub struct IssuedCertificate {
    pub certificate: X509,
    pub key: KeyPair,
}

pub struct CertificateIssuer {
    serials: Box<dyn SerialSource>,
}

impl Default for CertificateIssuer {
    fn default() -> Self {
        Self::new(Box::new(RandomSerial))
    }
}

impl CertificateIssuer {
    pub fn new(serials: Box<dyn SerialSource>) -> Self {
        Self { serials }
    }

    pub fn issue(
        &mut self,
        spec: &CertificateConfig,
        ca: &CertificateAuthority,
    ) -> Result<IssuedCertificate, PkiError> {
        let key = generate_key(spec.algorithm)?;
        let pkey = key.signing_key()?;
        let ca_key = ca.key.signing_key()?;

        let mut builder = X509::builder()?;
        builder.set_version(X509_VERSION_3)?;
        let serial = self.serials.next_serial(ca)?;
        builder.set_serial_number(&serial)?;
        let subject = subject_name(&spec.common_name, &spec.organization)?;
        builder.set_subject_name(&subject)?;
        builder.set_issuer_name(ca.certificate.subject_name())?;
        builder.set_pubkey(&pkey)?;

        builder.set_not_before(ca.certificate.not_before())?;
        let not_after = match spec.not_after {
            Some(at) => Asn1Time::from_unix(at.timestamp())?,
            None => Asn1Time::days_from_now(LEAF_VALIDITY_DAYS)?,
        };
        builder.set_not_after(&not_after)?;

        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;

        if !spec.usages.is_empty() {
            let mut usages = ExtendedKeyUsage::new();
            for usage in &spec.usages {
                match usage {
                    ExtendedUsage::ServerAuth => usages.server_auth(),
                    ExtendedUsage::ClientAuth => usages.client_auth(),
                };
            }
            builder.append_extension(usages.build()?)?;
        }

        let key_id = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(Some(&*ca.certificate), None))?;
        builder.append_extension(key_id)?;
        let authority_key_id = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(&*ca.certificate), None))?;
        builder.append_extension(authority_key_id)?;

        if !spec.alt_names.is_empty() {
            let mut alt_names = SubjectAlternativeName::new();
            for dns in spec.alt_names.unique_dns_names() {
                alt_names.dns(dns);
            }
            for ip in &spec.alt_names.ips {
                alt_names.ip(&ip.to_string());
            }
            let extension =
                alt_names.build(&builder.x509v3_context(Some(&*ca.certificate), None))?;
            builder.append_extension(extension)?;
        }

        builder.sign(&ca_key, ca.key.digest())?;

        // Hand back exactly what went on the wire
        let certificate = X509::from_der(&builder.build().to_der()?)?;
        Ok(IssuedCertificate { certificate, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{
        ca::create_self_signed, verification::verify_chain, AltNames, CaSubject, KeyAlgorithm,
    };
    use chrono::{TimeZone, Utc};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use x509_parser::prelude::*;

    fn test_ca(name: &str) -> CertificateAuthority {
        let key = generate_key(KeyAlgorithm::Ecdsa).unwrap();
        let certificate = create_self_signed(&CaSubject::new(name), &key).unwrap();
        CertificateAuthority {
            name: name.to_string(),
            certificate,
            key,
        }
    }

    fn with_parsed<T>(cert: &X509, f: impl FnOnce(&X509Certificate) -> T) -> T {
        let der = cert.to_der().unwrap();
        let (_, parsed) = X509Certificate::from_der(&der).unwrap();
        f(&parsed)
    }

    #[test]
    fn leaf_invariants_hold() {
        let ca = test_ca("root");
        let spec = CertificateConfig::new("root", "svc", "svc")
            .usages(&[ExtendedUsage::ServerAuth])
            .algorithm(KeyAlgorithm::Ecdsa);

        let issued = CertificateIssuer::default().issue(&spec, &ca).unwrap();

        assert_eq!(
            issued.certificate.not_before().compare(ca.certificate.not_before()).unwrap(),
            std::cmp::Ordering::Equal
        );
        with_parsed(&issued.certificate, |cert| {
            assert!(!cert.is_ca());
            let bc = cert.basic_constraints().unwrap().unwrap();
            assert!(!bc.value.ca);

            let usage = cert.key_usage().unwrap().unwrap().value;
            assert!(usage.digital_signature());
            assert!(usage.key_encipherment());
            assert!(!usage.key_cert_sign());

            let eku = cert.extended_key_usage().unwrap().unwrap().value;
            assert!(eku.server_auth);
            assert!(!eku.client_auth);
        });
        assert!(verify_chain(&issued.certificate, &ca.certificate).is_ok());
    }

    #[test]
    fn requested_usages_are_reproduced_exactly() {
        let ca = test_ca("etcd-ca");
        let spec = CertificateConfig::new("etcd-ca", "node", "etcd/all")
            .usages(&[ExtendedUsage::ServerAuth, ExtendedUsage::ClientAuth])
            .algorithm(KeyAlgorithm::Ecdsa);
        let issued = CertificateIssuer::default().issue(&spec, &ca).unwrap();

        with_parsed(&issued.certificate, |cert| {
            let eku = cert.extended_key_usage().unwrap().unwrap().value;
            assert!(eku.server_auth && eku.client_auth);
            assert!(!eku.code_signing && !eku.any);
            assert!(eku.other.is_empty());
        });
    }

    #[test]
    fn dns_names_are_deduplicated_in_order() {
        let ca = test_ca("root");
        let spec = CertificateConfig::new("root", "svc", "svc")
            .alt_names(AltNames::new(
                &["a", "a", "b"],
                &[
                    IpAddr::V4(Ipv4Addr::LOCALHOST),
                    IpAddr::V6(Ipv6Addr::LOCALHOST),
                ],
            ))
            .algorithm(KeyAlgorithm::Ecdsa);
        let issued = CertificateIssuer::default().issue(&spec, &ca).unwrap();

        with_parsed(&issued.certificate, |cert| {
            let san = cert.subject_alternative_name().unwrap().unwrap().value;
            let dns: Vec<&str> = san
                .general_names
                .iter()
                .filter_map(|n| match n {
                    GeneralName::DNSName(d) => Some(*d),
                    _ => None,
                })
                .collect();
            assert_eq!(dns, vec!["a", "b"]);

            let ips: Vec<&[u8]> = san
                .general_names
                .iter()
                .filter_map(|n| match n {
                    GeneralName::IPAddress(ip) => Some(*ip),
                    _ => None,
                })
                .collect();
            assert_eq!(ips.len(), 2);
            assert_eq!(ips[0], &[127, 0, 0, 1]);
            assert_eq!(ips[1].len(), 16);
        });
    }

    #[test]
    fn serials_are_unique_per_ca() {
        let ca = test_ca("root");
        let spec = CertificateConfig::new("root", "svc", "svc").algorithm(KeyAlgorithm::Ecdsa);
        let mut issuer = CertificateIssuer::default();

        let first = issuer.issue(&spec, &ca).unwrap();
        let second = issuer.issue(&spec, &ca).unwrap();

        let serial = |c: &X509| c.serial_number().to_bn().unwrap().to_vec();
        assert_ne!(serial(&first.certificate), serial(&second.certificate));
        assert_ne!(serial(&first.certificate), serial(&ca.certificate));
    }

    #[test]
    fn not_after_defaults_to_a_year_and_honours_override() {
        let ca = test_ca("root");
        let mut issuer = CertificateIssuer::default();

        let spec = CertificateConfig::new("root", "svc", "svc").algorithm(KeyAlgorithm::Ecdsa);
        let issued = issuer.issue(&spec, &ca).unwrap();
        let diff = Asn1Time::days_from_now(0)
            .unwrap()
            .diff(issued.certificate.not_after())
            .unwrap();
        assert!(diff.days == LEAF_VALIDITY_DAYS as i32 || diff.days == LEAF_VALIDITY_DAYS as i32 - 1);

        let expiry = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let issued = issuer
            .issue(&spec.clone().not_after(expiry), &ca)
            .unwrap();
        with_parsed(&issued.certificate, |cert| {
            assert_eq!(cert.validity().not_after.timestamp(), expiry.timestamp());
        });
    }

    #[test]
    fn subject_carries_organization() {
        let ca = test_ca("root");
        let spec = CertificateConfig::new("root", "kube-apiserver-kubelet-client", "x")
            .organization(&["system:masters"])
            .usages(&[ExtendedUsage::ClientAuth])
            .algorithm(KeyAlgorithm::Ecdsa);
        let issued = CertificateIssuer::default().issue(&spec, &ca).unwrap();

        with_parsed(&issued.certificate, |cert| {
            let orgs: Vec<&str> = cert
                .subject()
                .iter_organization()
                .filter_map(|o| o.as_str().ok())
                .collect();
            assert_eq!(orgs, vec!["system:masters"]);
            let cn: Vec<&str> = cert
                .subject()
                .iter_common_name()
                .filter_map(|o| o.as_str().ok())
                .collect();
            assert_eq!(cn, vec!["kube-apiserver-kubelet-client"]);
            assert_eq!(cert.issuer().to_string(), "CN=root");
        });
    }

    #[test]
    fn injected_serial_source_is_used() {
        struct Counter(u32);
        impl SerialSource for Counter {
            fn next_serial(&mut self, _ca: &CertificateAuthority) -> Result<Asn1Integer, PkiError> {
                self.0 += 1;
                Ok(BigNum::from_u32(self.0)?.to_asn1_integer()?)
            }
        }

        let ca = test_ca("root");
        let spec = CertificateConfig::new("root", "svc", "svc").algorithm(KeyAlgorithm::Ecdsa);
        let mut issuer = CertificateIssuer::new(Box::new(Counter(41)));
        let issued = issuer.issue(&spec, &ca).unwrap();

        let serial = issued.certificate.serial_number().to_bn().unwrap();
        assert_eq!(serial, BigNum::from_u32(42).unwrap());
    }
}
