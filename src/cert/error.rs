// src/cert/error.rs
use openssl::error::ErrorStack;
use std::{io, path::Path, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("data does not contain a recognized RSA or ECDSA private key block")]
    NoPrivateKey,

    #[error("no PUBLIC KEY block found")]
    NoPublicKey,

    #[error("no usable CERTIFICATE block found")]
    EmptyCertificateChain,

    #[error("unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    #[error("CA '{name}' is unusable: {source}")]
    InvalidCa {
        name: String,
        #[source]
        source: Box<PkiError>,
    },

    #[error("malformed PEM data: {0}")]
    Pem(#[from] ::pem::PemError),

    #[error("cryptographic operation failed: {0}")]
    Crypto(#[from] ErrorStack),

    #[error("catalog entry '{leaf}' references unknown CA '{ca}'")]
    UnknownIssuer { leaf: String, ca: String },

    #[error("duplicate catalog entry: {0}")]
    DuplicateEntry(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error("certificate {} failed verification: {reason}", path.display())]
    VerificationFailed { path: PathBuf, reason: String },
}

impl PkiError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        PkiError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn invalid_ca(name: &str, source: PkiError) -> Self {
        PkiError::InvalidCa {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<PkiError> for io::Error {
    fn from(error: PkiError) -> Self {
        match error {
            PkiError::MissingFile(_) => io::Error::new(io::ErrorKind::NotFound, error.to_string()),
            PkiError::Io { source, path } => io::Error::new(
                source.kind(),
                format!("{}: {}", path.display(), source),
            ),
            PkiError::InvalidConfig(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
            }
            PkiError::NoPrivateKey
            | PkiError::NoPublicKey
            | PkiError::EmptyCertificateChain
            | PkiError::UnsupportedKeyAlgorithm(_)
            | PkiError::InvalidCa { .. }
            | PkiError::Pem(_) => io::Error::new(io::ErrorKind::InvalidData, error.to_string()),
            _ => io::Error::new(io::ErrorKind::Other, error.to_string()),
        }
    }
}
