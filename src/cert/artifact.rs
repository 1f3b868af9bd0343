use crate::utils::errors::{CertSyncError, Result};
use sha2::{Digest, Sha256};

pub const FULLCHAIN_FILE: &str = "fullchain.pem";
pub const PRIVKEY_FILE: &str = "privkey.pem";

/// Full chain certificate plus private key for one domain.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateArtifact {
    pub fullchain: Vec<u8>,
    pub privkey: Vec<u8>,
}

impl CertificateArtifact {
    /// Build an artifact, rejecting empty blobs
    pub fn new(fullchain: Vec<u8>, privkey: Vec<u8>) -> Result<Self> {
        let artifact = Self { fullchain, privkey };
        artifact.ensure_valid()?;
        Ok(artifact)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        if self.fullchain.is_empty() {
            return Err(CertSyncError::InvalidInput(format!("{FULLCHAIN_FILE} is empty")));
        }
        if self.privkey.is_empty() {
            return Err(CertSyncError::InvalidInput(format!("{PRIVKEY_FILE} is empty")));
        }
        Ok(())
    }

    /// SHA256 over both blobs, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Sha256::digest(&self.fullchain));
        hasher.update(Sha256::digest(&self.privkey));
        hex::encode(hasher.finalize())
    }

    pub fn fullchain_pem(&self) -> Result<&str> {
        std::str::from_utf8(&self.fullchain)
            .map_err(|e| CertSyncError::CertParsing(format!("{FULLCHAIN_FILE} is not UTF-8: {e}")))
    }
}

// Never print key material.
impl std::fmt::Debug for CertificateArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateArtifact")
            .field("fullchain_len", &self.fullchain.len())
            .field("privkey_len", &self.privkey.len())
            .finish()
    }
}
