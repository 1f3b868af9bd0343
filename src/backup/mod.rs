//! Timestamped tar.gz snapshots of the certificate directory, mirrored to
//! the object store under `<object-prefix>/<hostname>_certificate_<ts>.tar.gz`.

pub mod restore;

pub use restore::{restore_archives, RestoreSummary};

use crate::resolver::BatchHook;
use crate::storage::object::{join_key, ObjectStore};
use crate::storage::UploadOutcome;
use crate::utils::config::BackupSettings;
use crate::utils::errors::{CertSyncError, Result};
use crate::utils::paths::CertSyncPaths;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct BackupArchiver {
    source_dir: PathBuf,
    staging_dir: PathBuf,
    object_prefix: String,
    hostname: String,
    objects: Arc<dyn ObjectStore>,
}

impl BackupArchiver {
    pub fn new(
        settings: &BackupSettings,
        staging_dir: PathBuf,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "localhost".to_string());

        Self {
            source_dir: settings.source_dir.clone(),
            staging_dir,
            object_prefix: settings.object_prefix.clone(),
            hostname,
            objects,
        }
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    pub fn archive_name(&self, at: DateTime<Local>) -> String {
        format!(
            "{}_certificate_{}.tar.gz",
            self.hostname,
            at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn object_key(&self, archive: &Path) -> Result<String> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CertSyncError::Archive(format!("Invalid archive path: {}", archive.display()))
            })?;
        Ok(join_key([self.object_prefix.as_str(), file_name]))
    }

    /// Write a gzip'd tarball of the source directory into the staging directory
    pub fn create_archive(&self, at: DateTime<Local>) -> Result<PathBuf> {
        if !self.source_dir.is_dir() {
            return Err(CertSyncError::Archive(format!(
                "Backup source {} is not a directory",
                self.source_dir.display()
            )));
        }
        CertSyncPaths::ensure_dir_exists(&self.staging_dir)?;

        let archive_path = self.staging_dir.join(self.archive_name(at));
        let base_name = self
            .source_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "certificates".to_string());

        let result = (|| -> std::io::Result<()> {
            let file = File::create(&archive_path)?;
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            // live/ entries are symlinks into archive/; keep them as links
            builder.follow_symlinks(false);
            builder.append_dir_all(&base_name, &self.source_dir)?;
            builder.into_inner()?.finish()?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&archive_path);
            return Err(CertSyncError::Archive(format!(
                "Failed to archive {}: {e}",
                self.source_dir.display()
            )));
        }

        CertSyncPaths::set_secure_file_permissions(&archive_path)?;
        tracing::info!("Backup stored at: {}", archive_path.display());
        Ok(archive_path)
    }

    /// Upload an archive unless an object with the same name already exists
    pub async fn upload_archive(&self, archive: &Path) -> Result<UploadOutcome> {
        let key = self.object_key(archive)?;
        if self.objects.head(&key).await? {
            tracing::info!("Backup {} already exists remotely, skipping upload", key);
            return Ok(UploadOutcome::AlreadyPresent);
        }

        let body = fs::read(archive)?;
        self.objects.put(&key, body).await?;
        tracing::info!("Backup uploaded to {}/{}", self.objects.describe(), key);
        Ok(UploadOutcome::Uploaded)
    }

    pub async fn run(&self) -> Result<(PathBuf, UploadOutcome)> {
        let archive = self.create_archive(Local::now())?;
        let outcome = self.upload_archive(&archive).await?;
        Ok((archive, outcome))
    }
}

#[async_trait]
impl BatchHook for BackupArchiver {
    fn name(&self) -> &str {
        "backup"
    }

    async fn after_success(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }
}
