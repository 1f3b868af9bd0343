use crate::cert::{CertificateArtifact, CertificateKey, FULLCHAIN_FILE, PRIVKEY_FILE};
use crate::utils::errors::{CertSyncError, Result};
use crate::utils::paths::CertSyncPaths;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-domain certificate directories under a configurable root:
/// `<cert-root>/<domain>/{fullchain.pem,privkey.pem}`.
///
/// The routing key only namespaces the remote store; locally a domain has
/// exactly one directory.
#[derive(Debug, Clone)]
pub struct LocalCertStore {
    root: PathBuf,
}

impl LocalCertStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn domain_dir(&self, key: &CertificateKey) -> PathBuf {
        self.root.join(key.domain())
    }

    pub fn fullchain_path(&self, key: &CertificateKey) -> PathBuf {
        self.domain_dir(key).join(FULLCHAIN_FILE)
    }

    pub fn privkey_path(&self, key: &CertificateKey) -> PathBuf {
        self.domain_dir(key).join(PRIVKEY_FILE)
    }

    /// Both files exist and are non-empty
    pub fn is_complete(&self, key: &CertificateKey) -> bool {
        non_empty_file(&self.fullchain_path(key)) && non_empty_file(&self.privkey_path(key))
    }

    /// The directory exists but does not hold a complete pair
    pub fn is_incomplete_present(&self, key: &CertificateKey) -> bool {
        self.domain_dir(key).exists() && !self.is_complete(key)
    }

    /// Remove the key's directory; missing directories are fine
    pub fn purge(&self, key: &CertificateKey) -> Result<()> {
        let dir = self.domain_dir(key);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!("Purged certificate directory: {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CertSyncError::Storage(format!(
                "Failed to purge {}: {e}",
                dir.display()
            ))),
        }
    }

    /// Write both files, each via temp file + rename so a reader never sees
    /// a torn file. The pair as a whole is not transactional.
    pub fn write(&self, key: &CertificateKey, artifact: &CertificateArtifact) -> Result<()> {
        artifact.ensure_valid()?;

        let dir = self.domain_dir(key);
        CertSyncPaths::ensure_dir_exists(&dir)?;

        atomic_write(&self.fullchain_path(key), &artifact.fullchain, false)?;
        atomic_write(&self.privkey_path(key), &artifact.privkey, true)?;

        tracing::debug!("Certificate files written to {}", dir.display());
        Ok(())
    }

    /// Read a complete local pair
    pub fn read(&self, key: &CertificateKey) -> Result<CertificateArtifact> {
        if !self.is_complete(key) {
            return Err(CertSyncError::Storage(format!(
                "No complete certificate for {key} under {}",
                self.domain_dir(key).display()
            )));
        }
        let fullchain = fs::read(self.fullchain_path(key))?;
        let privkey = fs::read(self.privkey_path(key))?;
        CertificateArtifact::new(fullchain, privkey)
    }
}

fn non_empty_file(path: &Path) -> bool {
    // metadata() follows symlinks, so ACME client live/ links resolve to archive/
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Replace `path` via a temp file in the same directory and a rename
pub(crate) fn atomic_write(path: &Path, contents: &[u8], secret: bool) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CertSyncError::Storage(format!("Invalid path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)?;
        if secret {
            CertSyncPaths::set_secure_file_permissions(&tmp)?;
        }
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(domain: &str) -> CertificateKey {
        CertificateKey::new(domain, None).unwrap()
    }

    fn artifact() -> CertificateArtifact {
        CertificateArtifact::new(b"CHAIN".to_vec(), b"KEY".to_vec()).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalCertStore::new(tmp.path());
        let key = key("example.com");

        assert!(!store.is_complete(&key));
        assert!(!store.is_incomplete_present(&key));

        store.write(&key, &artifact()).unwrap();
        assert!(store.is_complete(&key));
        assert!(!store.is_incomplete_present(&key));
        assert_eq!(store.read(&key).unwrap(), artifact());
        assert_eq!(
            store.fullchain_path(&key),
            tmp.path().join("example.com").join("fullchain.pem")
        );

        // no temp files left behind
        let names: Vec<String> = fs::read_dir(store.domain_dir(&key))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalCertStore::new(tmp.path());
        let key = key("example.com");
        store.write(&key, &artifact()).unwrap();
        let mode = fs::metadata(store.privkey_path(&key))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_single_file_is_incomplete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalCertStore::new(tmp.path());
        let key = key("example.com");

        fs::create_dir_all(store.domain_dir(&key)).unwrap();
        fs::write(store.fullchain_path(&key), b"CHAIN").unwrap();

        assert!(!store.is_complete(&key));
        assert!(store.is_incomplete_present(&key));
        assert!(store.read(&key).is_err());
    }

    #[test]
    fn test_empty_file_is_incomplete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalCertStore::new(tmp.path());
        let key = key("example.com");

        fs::create_dir_all(store.domain_dir(&key)).unwrap();
        fs::write(store.fullchain_path(&key), b"CHAIN").unwrap();
        fs::write(store.privkey_path(&key), b"").unwrap();

        assert!(store.is_incomplete_present(&key));
    }

    #[test]
    fn test_purge_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalCertStore::new(tmp.path());
        let key = key("example.com");

        store.purge(&key).unwrap();
        store.write(&key, &artifact()).unwrap();
        store.purge(&key).unwrap();
        assert!(!store.domain_dir(&key).exists());
        store.purge(&key).unwrap();
    }

    #[test]
    fn test_write_rejects_invalid_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalCertStore::new(tmp.path());
        let key = key("example.com");
        let bad = CertificateArtifact {
            fullchain: b"CHAIN".to_vec(),
            privkey: Vec::new(),
        };
        assert!(store.write(&key, &bad).is_err());
        assert!(!store.domain_dir(&key).exists());
    }
}
