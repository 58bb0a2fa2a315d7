// src/cert/mod.rs
pub mod ca;
pub mod catalog;
pub mod encoding;
mod error;
pub mod issuer;
mod keys;
pub mod operations;
pub mod service_account;
mod types;
pub mod verification;

pub use ca::{CaStore, CertificateAuthority};
pub use catalog::PkiCatalog;
pub use error::PkiError;
pub use keys::{generate_key, KeyPair, Signer};
pub use operations::CertificateOperations;
pub use types::{AltNames, CaSubject, CertificateConfig, ExtendedUsage, KeyAlgorithm};
