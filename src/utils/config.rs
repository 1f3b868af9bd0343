use crate::proxy::ProxyServer;
use crate::storage::remote::UploadPolicy;
use crate::utils::errors::{CertSyncError, Result};
use crate::utils::paths::{CertSyncPaths, DEFAULT_BACKUP_SOURCE, DEFAULT_CERT_ROOT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime settings, passed explicitly to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base directory holding one `<domain>/` directory per certificate
    pub cert_root: PathBuf,
    pub remote: RemoteSettings,
    pub issuer: IssuerSettings,
    pub proxy: ProxySettings,
    pub backup: BackupSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub bucket: Option<String>,
    /// Key prefix in front of `[<routing-key>/]<domain>/`; empty for the legacy layout
    pub prefix: String,
    pub routing_key: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores
    pub endpoint_url: Option<String>,
    pub timeout_secs: u64,
    pub upload_policy: UploadPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerSettings {
    pub program: String,
    pub email: Option<String>,
    /// Passed to the ACME client as `--config-dir`
    pub config_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub server: ProxyServer,
    pub sites_available: Option<PathBuf>,
    pub sites_enabled: Option<PathBuf>,
    pub upstream_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub source_dir: PathBuf,
    /// Where archives are written before upload (defaults to the data dir)
    pub staging_dir: Option<PathBuf>,
    pub object_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cert_root: PathBuf::from(DEFAULT_CERT_ROOT),
            remote: RemoteSettings::default(),
            issuer: IssuerSettings::default(),
            proxy: ProxySettings::default(),
            backup: BackupSettings::default(),
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: String::new(),
            routing_key: None,
            region: None,
            endpoint_url: None,
            timeout_secs: 60,
            upload_policy: UploadPolicy::default(),
        }
    }
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            program: "certbot".to_string(),
            email: None,
            config_dir: None,
            timeout_secs: 600,
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            server: ProxyServer::Nginx,
            sites_available: None,
            sites_enabled: None,
            upstream_host: "localhost".to_string(),
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_BACKUP_SOURCE),
            staging_dir: None,
            object_prefix: "backup/certificates".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// An explicitly requested file must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (CertSyncPaths::config_file()?, false),
        };

        if !path.exists() {
            if required {
                return Err(CertSyncError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings = Self::from_yaml(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings: Settings = serde_yaml::from_str(content)?;
        settings.expand_paths();
        settings.align_with_issuer_dir();
        settings.validate()?;
        Ok(settings)
    }

    fn expand_paths(&mut self) {
        let expand = |p: &Path| CertSyncPaths::expand_home(&p.to_string_lossy());
        self.cert_root = expand(&self.cert_root);
        self.backup.source_dir = expand(&self.backup.source_dir);
        self.backup.staging_dir = self.backup.staging_dir.as_deref().map(expand);
        self.issuer.config_dir = self.issuer.config_dir.as_deref().map(expand);
    }

    /// With a custom ACME client `--config-dir`, certificates land in
    /// `<config_dir>/live`; default paths follow it.
    pub fn align_with_issuer_dir(&mut self) {
        let Some(config_dir) = &self.issuer.config_dir else {
            return;
        };
        if self.cert_root == Path::new(DEFAULT_CERT_ROOT) {
            self.cert_root = config_dir.join("live");
        }
        if self.backup.source_dir == Path::new(DEFAULT_BACKUP_SOURCE) {
            self.backup.source_dir = config_dir.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cert_root.as_os_str().is_empty() {
            return Err(CertSyncError::Config("cert_root must not be empty".to_string()));
        }
        if let Some(config_dir) = &self.issuer.config_dir {
            let live = config_dir.join("live");
            if self.cert_root != live {
                return Err(CertSyncError::Config(format!(
                    "cert_root {} does not match issuer.config_dir (expected {})",
                    self.cert_root.display(),
                    live.display()
                )));
            }
        }
        if let Some(bucket) = &self.remote.bucket {
            if bucket.trim().is_empty() {
                return Err(CertSyncError::Config("remote.bucket must not be empty".to_string()));
            }
        }
        if let Some(key) = &self.remote.routing_key {
            if key.is_empty() || key.contains('/') {
                return Err(CertSyncError::Config(format!(
                    "remote.routing_key is invalid: '{key}'"
                )));
            }
        }
        if self.remote.timeout_secs == 0 || self.issuer.timeout_secs == 0 {
            return Err(CertSyncError::Config("timeouts must be positive".to_string()));
        }
        if self.issuer.program.trim().is_empty() {
            return Err(CertSyncError::Config("issuer.program must not be empty".to_string()));
        }
        Ok(())
    }

    /// Bucket name, required by every remote operation
    pub fn bucket(&self) -> Result<&str> {
        self.remote.bucket.as_deref().ok_or_else(|| {
            CertSyncError::Config(
                "No bucket configured (use --bucket, CERTSYNC_BUCKET or remote.bucket)".to_string(),
            )
        })
    }

    pub fn email(&self) -> Result<&str> {
        self.issuer.email.as_deref().ok_or_else(|| {
            CertSyncError::Config(
                "No ACME account email configured (use --email or issuer.email)".to_string(),
            )
        })
    }

    pub fn backup_staging_dir(&self) -> Result<PathBuf> {
        match &self.backup.staging_dir {
            Some(dir) => Ok(dir.clone()),
            None => CertSyncPaths::backup_staging_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cert_root, PathBuf::from("/etc/letsencrypt/live"));
        assert_eq!(settings.issuer.program, "certbot");
        assert_eq!(settings.backup.object_prefix, "backup/certificates");
        assert_eq!(settings.remote.upload_policy, UploadPolicy::SkipIfExists);
        assert!(settings.bucket().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cert_root: /srv/certs
remote:
  bucket: my-certs
  routing_key: 10.0.0.5
proxy:
  server: apache
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.cert_root, PathBuf::from("/srv/certs"));
        assert_eq!(settings.bucket().unwrap(), "my-certs");
        assert_eq!(settings.remote.routing_key.as_deref(), Some("10.0.0.5"));
        assert_eq!(settings.remote.timeout_secs, 60);
        assert_eq!(settings.proxy.server, ProxyServer::Apache);
        assert_eq!(settings.proxy.upstream_host, "localhost");
    }

    #[test]
    fn test_upload_policy_from_yaml() {
        let yaml = "remote:\n  upload_policy: replace_on_mismatch\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(
            settings.remote.upload_policy,
            UploadPolicy::ReplaceOnMismatch
        );
    }

    #[test]
    fn test_invalid_routing_key_rejected() {
        let yaml = "remote:\n  routing_key: a/b\n";
        assert!(matches!(
            Settings::from_yaml(yaml),
            Err(CertSyncError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.yaml");
        assert!(matches!(
            Settings::load(Some(&missing)),
            Err(CertSyncError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "issuer:\n  email: ops@example.com\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.email().unwrap(), "ops@example.com");
    }

    #[test]
    fn test_issuer_config_dir_moves_default_paths() {
        let yaml = "issuer:\n  config_dir: /srv/acme\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.cert_root, PathBuf::from("/srv/acme/live"));
        assert_eq!(settings.backup.source_dir, PathBuf::from("/srv/acme"));
    }

    #[test]
    fn test_issuer_config_dir_keeps_explicit_backup_source() {
        let yaml = "issuer:\n  config_dir: /srv/acme\nbackup:\n  source_dir: /srv/all\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.cert_root, PathBuf::from("/srv/acme/live"));
        assert_eq!(settings.backup.source_dir, PathBuf::from("/srv/all"));
    }

    #[test]
    fn test_cert_root_outside_issuer_config_dir_rejected() {
        let yaml = "cert_root: /srv/certs\nissuer:\n  config_dir: /srv/acme\n";
        assert!(matches!(
            Settings::from_yaml(yaml),
            Err(CertSyncError::Config(_))
        ));
    }
}
