// src/cert/service_account.rs
use super::{
    encoding::{decode_key, decode_public_key, encode_key, encode_public_key},
    generate_key, KeyAlgorithm, KeyPair, PkiError, Signer,
};
use crate::utils::{
    fs::{read_file, write_atomic, PRIVATE_MODE},
    logging::Logger,
};
use std::path::{Path, PathBuf};

pub const SA_KEY_FILE: &str = "sa.key";
pub const SA_PUB_FILE: &str = "sa.pub";

/// Token-signing keypair for service accounts. No certificate is issued for
/// it; both files stay owner-only.
pub struct ServiceAccountGenerator {
    output_dir: PathBuf,
}

impl ServiceAccountGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn key_path(&self) -> PathBuf {
        self.output_dir.join(SA_KEY_FILE)
    }

    pub fn pub_path(&self) -> PathBuf {
        self.output_dir.join(SA_PUB_FILE)
    }

    pub fn generate_service_account_keys(
        &self,
        logger: &mut dyn Logger,
    ) -> Result<KeyPair, PkiError> {
        logger.log("Generating service account key pair");

        let key = generate_key(KeyAlgorithm::Rsa)?;
        write_atomic(&self.key_path(), &encode_key(&key)?, PRIVATE_MODE)?;
        write_atomic(&self.pub_path(), &encode_public_key(&key)?, PRIVATE_MODE)?;

        logger.debug_log(&format!(
            "Wrote {} and {}",
            self.key_path().display(),
            self.pub_path().display()
        ));
        logger.log("Service account keys generated successfully");
        Ok(key)
    }

    /// Checks that `sa.pub` is the public half of `sa.key`.
    pub fn verify_keypair(&self) -> Result<(), PkiError> {
        let key = decode_key(&read_file(&self.key_path())?)?;
        let public = decode_public_key(&read_file(&self.pub_path())?)?;

        let private = key.signing_key()?;
        if !public.public_eq(&private) {
            return Err(mismatch(&self.pub_path()));
        }
        Ok(())
    }
}

fn mismatch(path: &Path) -> PkiError {
    PkiError::VerificationFailed {
        path: path.to_path_buf(),
        reason: "public key does not match sa.key".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::MockLogger;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn generates_matching_rsa_pair() {
        let temp_dir = TempDir::new().unwrap();
        let generator = ServiceAccountGenerator::new(temp_dir.path());
        let mut logger = MockLogger::new();

        let key = generator.generate_service_account_keys(&mut logger).unwrap();
        assert_eq!(key.algorithm(), KeyAlgorithm::Rsa);
        assert!(generator.verify_keypair().is_ok());

        let pem = fs::read_to_string(temp_dir.path().join("sa.pub")).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(logger
            .logs
            .iter()
            .any(|l| l.contains("Service account keys generated")));
    }

    #[cfg(unix)]
    #[test]
    fn both_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let generator = ServiceAccountGenerator::new(temp_dir.path());
        generator
            .generate_service_account_keys(&mut MockLogger::new())
            .unwrap();

        for file in [SA_KEY_FILE, SA_PUB_FILE] {
            let mode = fs::metadata(temp_dir.path().join(file))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600, "{}", file);
        }
    }

    #[test]
    fn detects_swapped_public_key() {
        let temp_dir = TempDir::new().unwrap();
        let generator = ServiceAccountGenerator::new(temp_dir.path());
        generator
            .generate_service_account_keys(&mut MockLogger::new())
            .unwrap();

        let other = generate_key(KeyAlgorithm::Rsa).unwrap();
        fs::write(generator.pub_path(), encode_public_key(&other).unwrap()).unwrap();

        assert!(matches!(
            generator.verify_keypair(),
            Err(PkiError::VerificationFailed { .. })
        ));
    }
}
