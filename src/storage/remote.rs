use crate::cert::{CertificateArtifact, CertificateKey, FULLCHAIN_FILE, PRIVKEY_FILE};
use crate::storage::object::{join_key, ObjectStore};
use crate::utils::errors::{CertSyncError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What `upload` does when the pair is already present remotely
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPolicy {
    /// Never overwrite. Remote bytes are not compared, so a stale remote copy
    /// wins over a newer local one.
    #[default]
    SkipIfExists,
    /// Compare SHA256 fingerprints and overwrite only on mismatch
    ReplaceOnMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    AlreadyPresent,
    Replaced,
}

impl UploadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadOutcome::Uploaded => "uploaded",
            UploadOutcome::AlreadyPresent => "already-present",
            UploadOutcome::Replaced => "replaced",
        }
    }
}

/// Certificate pairs in an object store, addressed as
/// `<prefix>/[<routing-key>/]<domain>/{fullchain.pem,privkey.pem}`.
#[derive(Clone)]
pub struct RemoteCertStore {
    objects: Arc<dyn ObjectStore>,
    prefix: String,
    policy: UploadPolicy,
}

impl RemoteCertStore {
    pub fn new(objects: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            objects,
            prefix: prefix.trim_matches('/').to_string(),
            policy: UploadPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn fullchain_key(&self, key: &CertificateKey) -> String {
        self.object_key(key, FULLCHAIN_FILE)
    }

    pub fn privkey_key(&self, key: &CertificateKey) -> String {
        self.object_key(key, PRIVKEY_FILE)
    }

    fn object_key(&self, key: &CertificateKey, file: &str) -> String {
        join_key([
            self.prefix.as_str(),
            key.routing_key().unwrap_or(""),
            key.domain(),
            file,
        ])
    }

    /// True iff both objects exist
    pub async fn exists(&self, key: &CertificateKey) -> Result<bool> {
        if !self.objects.head(&self.fullchain_key(key)).await? {
            return Ok(false);
        }
        self.objects.head(&self.privkey_key(key)).await
    }

    /// Fetch both objects; anything short of a complete non-empty pair is an error
    pub async fn download(&self, key: &CertificateKey) -> Result<CertificateArtifact> {
        let fullchain = self.fetch(&self.fullchain_key(key)).await?;
        let privkey = self.fetch(&self.privkey_key(key)).await?;

        CertificateArtifact::new(fullchain, privkey).map_err(|e| {
            CertSyncError::Remote(format!("Remote certificate for {key} is unusable: {e}"))
        })
    }

    async fn fetch(&self, object_key: &str) -> Result<Vec<u8>> {
        self.objects.get(object_key).await?.ok_or_else(|| {
            CertSyncError::Remote(format!(
                "{}/{object_key} disappeared during download",
                self.objects.describe()
            ))
        })
    }

    /// Mirror a pair. Skipped when the pair already exists, unless the policy
    /// asks for a fingerprint comparison.
    pub async fn upload(
        &self,
        key: &CertificateKey,
        artifact: &CertificateArtifact,
    ) -> Result<UploadOutcome> {
        artifact.ensure_valid()?;

        if self.exists(key).await? {
            match self.policy {
                UploadPolicy::SkipIfExists => {
                    tracing::debug!("Certificate for {} already present remotely", key);
                    return Ok(UploadOutcome::AlreadyPresent);
                }
                UploadPolicy::ReplaceOnMismatch => {
                    let remote = self.download(key).await?;
                    if remote.fingerprint() == artifact.fingerprint() {
                        return Ok(UploadOutcome::AlreadyPresent);
                    }
                    tracing::warn!(
                        "Remote certificate for {} differs from local copy, replacing",
                        key
                    );
                    self.put_pair(key, artifact).await?;
                    return Ok(UploadOutcome::Replaced);
                }
            }
        }

        self.put_pair(key, artifact).await?;
        Ok(UploadOutcome::Uploaded)
    }

    async fn put_pair(&self, key: &CertificateKey, artifact: &CertificateArtifact) -> Result<()> {
        // private key last: a reader probing with `exists` sees the pair only once both landed
        self.objects
            .put(&self.fullchain_key(key), artifact.fullchain.clone())
            .await?;
        self.objects
            .put(&self.privkey_key(key), artifact.privkey.clone())
            .await?;
        tracing::info!(
            "Certificate for {} uploaded to {}",
            key,
            self.objects.describe()
        );
        Ok(())
    }
}
