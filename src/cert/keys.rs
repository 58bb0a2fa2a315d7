// src/cert/keys.rs
use super::{KeyAlgorithm, PkiError};
use openssl::{
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
    rsa::Rsa,
};

pub const RSA_KEY_SIZE: u32 = 2048;

/// Anything able to sign a certificate.
pub trait Signer {
    fn algorithm(&self) -> KeyAlgorithm;
    fn signing_key(&self) -> Result<PKey<Private>, PkiError>;

    fn digest(&self) -> MessageDigest {
        MessageDigest::sha256()
    }
}

#[derive(Clone)]
pub enum KeyPair {
    Rsa(Rsa<Private>),
    Ecdsa(EcKey<Private>),
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPair::Rsa(key) => write!(f, "KeyPair::Rsa({} bits)", key.size() * 8),
            KeyPair::Ecdsa(_) => write!(f, "KeyPair::Ecdsa"),
        }
    }
}

impl KeyPair {
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self, PkiError> {
        match algorithm {
            KeyAlgorithm::Rsa => Ok(KeyPair::Rsa(Rsa::generate(RSA_KEY_SIZE)?)),
            KeyAlgorithm::Ecdsa => {
                let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
                Ok(KeyPair::Ecdsa(EcKey::generate(&group)?))
            }
        }
    }

    /// Wraps a generic key, rejecting anything that is neither RSA nor EC.
    pub fn from_pkey(pkey: PKey<Private>) -> Result<Self, PkiError> {
        if let Ok(rsa) = pkey.rsa() {
            return Ok(KeyPair::Rsa(rsa));
        }
        if let Ok(ec) = pkey.ec_key() {
            return Ok(KeyPair::Ecdsa(ec));
        }
        Err(PkiError::UnsupportedKeyAlgorithm(format!("{:?}", pkey.id())))
    }

    pub fn private_key_der(&self) -> Result<Vec<u8>, PkiError> {
        Ok(match self {
            KeyPair::Rsa(key) => key.private_key_to_der()?,
            KeyPair::Ecdsa(key) => key.private_key_to_der()?,
        })
    }
}

impl Signer for KeyPair {
    fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa(_) => KeyAlgorithm::Rsa,
            KeyPair::Ecdsa(_) => KeyAlgorithm::Ecdsa,
        }
    }

    fn signing_key(&self) -> Result<PKey<Private>, PkiError> {
        Ok(match self {
            KeyPair::Rsa(key) => PKey::from_rsa(key.clone())?,
            KeyPair::Ecdsa(key) => PKey::from_ec_key(key.clone())?,
        })
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm() == other.algorithm()
            && matches!(
                (self.private_key_der(), other.private_key_der()),
                (Ok(a), Ok(b)) if a == b
            )
    }
}

pub fn generate_key(algorithm: KeyAlgorithm) -> Result<KeyPair, PkiError> {
    KeyPair::generate(algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_keys_use_fixed_modulus() {
        let key = generate_key(KeyAlgorithm::Rsa).unwrap();
        match &key {
            KeyPair::Rsa(rsa) => assert_eq!(rsa.size() * 8, RSA_KEY_SIZE),
            other => panic!("expected RSA key, got {:?}", other),
        }
        assert_eq!(key.algorithm(), KeyAlgorithm::Rsa);
    }

    #[test]
    fn ecdsa_keys_use_p256() {
        let key = generate_key(KeyAlgorithm::Ecdsa).unwrap();
        match &key {
            KeyPair::Ecdsa(ec) => {
                assert_eq!(ec.group().curve_name(), Some(Nid::X9_62_PRIME256V1))
            }
            other => panic!("expected ECDSA key, got {:?}", other),
        }
    }

    #[test]
    fn fresh_keys_are_distinct() {
        let a = generate_key(KeyAlgorithm::Ecdsa).unwrap();
        let b = generate_key(KeyAlgorithm::Ecdsa).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn from_pkey_rejects_ed25519() {
        let pkey = PKey::generate_ed25519().unwrap();
        assert!(matches!(
            KeyPair::from_pkey(pkey),
            Err(PkiError::UnsupportedKeyAlgorithm(_))
        ));
    }
}
