// src/cert/encoding.rs
//
// PEM envelopes for keys and certificates. Decoding walks every block in the
// input and skips the ones it does not understand, so files written by other
// tools (with EC PARAMETERS blocks, bag attributes, etc.) still load.
use super::{KeyPair, PkiError, Signer};
use ::pem::Pem;
use openssl::{
    ec::EcKey,
    pkey::{PKey, Public},
    rsa::Rsa,
    x509::X509,
};

pub const EC_PRIVATE_KEY_BLOCK_TYPE: &str = "EC PRIVATE KEY";
pub const RSA_PRIVATE_KEY_BLOCK_TYPE: &str = "RSA PRIVATE KEY";
pub const PRIVATE_KEY_BLOCK_TYPE: &str = "PRIVATE KEY";
pub const PUBLIC_KEY_BLOCK_TYPE: &str = "PUBLIC KEY";
pub const CERTIFICATE_BLOCK_TYPE: &str = "CERTIFICATE";

const BEGIN_MARKER: &[u8] = b"-----BEGIN ";
const END_MARKER: &[u8] = b"-----END ";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Every block in `data` whose envelope and body decode. A block that fails
/// is dropped and scanning resumes just past its BEGIN line.
fn scan_blocks(data: &[u8]) -> Vec<Pem> {
    let mut blocks = Vec::new();
    let mut rest = data;

    while let Some(start) = find(rest, BEGIN_MARKER) {
        let candidate = &rest[start..];
        let Some(end) = find(candidate, END_MARKER) else {
            break;
        };
        let trailer = &candidate[end..];
        let len = end
            + trailer
                .iter()
                .position(|&b| b == b'\n')
                .map_or(trailer.len(), |newline| newline + 1);

        match ::pem::parse(&candidate[..len]) {
            Ok(block) => {
                blocks.push(block);
                rest = &candidate[len..];
            }
            Err(_) => rest = &candidate[BEGIN_MARKER.len()..],
        }
    }
    blocks
}

pub fn encode_key(key: &KeyPair) -> Result<Vec<u8>, PkiError> {
    Ok(match key {
        KeyPair::Rsa(rsa) => rsa.private_key_to_pem()?,
        KeyPair::Ecdsa(ec) => ec.private_key_to_pem()?,
    })
}

pub fn encode_public_key(key: &KeyPair) -> Result<Vec<u8>, PkiError> {
    Ok(key.signing_key()?.public_key_to_pem()?)
}

pub fn encode_certificate(cert: &X509) -> Result<Vec<u8>, PkiError> {
    Ok(cert.to_pem()?)
}

/// Returns the first private key block that parses under its decoder.
pub fn decode_key(data: &[u8]) -> Result<KeyPair, PkiError> {
    for block in scan_blocks(data) {
        let key = match block.tag() {
            EC_PRIVATE_KEY_BLOCK_TYPE => EcKey::private_key_from_der(block.contents())
                .map(KeyPair::Ecdsa)
                .ok(),
            RSA_PRIVATE_KEY_BLOCK_TYPE => Rsa::private_key_from_der(block.contents())
                .map(KeyPair::Rsa)
                .ok(),
            PRIVATE_KEY_BLOCK_TYPE => match PKey::private_key_from_pkcs8(block.contents()) {
                Ok(pkey) => return KeyPair::from_pkey(pkey),
                Err(_) => None,
            },
            _ => None,
        };

        if let Some(key) = key {
            return Ok(key);
        }
    }

    Err(PkiError::NoPrivateKey)
}

pub fn decode_public_key(data: &[u8]) -> Result<PKey<Public>, PkiError> {
    let block = scan_blocks(data)
        .into_iter()
        .find(|block| block.tag() == PUBLIC_KEY_BLOCK_TYPE)
        .ok_or(PkiError::NoPublicKey)?;
    Ok(PKey::public_key_from_der(block.contents())?)
}

/// Certificates in file order. Parsing happens as the iterator advances and
/// the blocks are consumed, so a chain can be walked only once.
pub struct CertificateChain {
    blocks: std::vec::IntoIter<Pem>,
}

impl Iterator for CertificateChain {
    type Item = Result<X509, PkiError>;

    fn next(&mut self) -> Option<Self::Item> {
        for block in self.blocks.by_ref() {
            // Only plain CERTIFICATE blocks, never ones carrying headers
            if block.tag() != CERTIFICATE_BLOCK_TYPE || block.headers().iter().next().is_some() {
                continue;
            }
            return Some(X509::from_der(block.contents()).map_err(PkiError::from));
        }
        None
    }
}

pub fn decode_certificate_chain(data: &[u8]) -> Result<CertificateChain, PkiError> {
    Ok(CertificateChain {
        blocks: scan_blocks(data).into_iter(),
    })
}
