use crate::utils::errors::{CertSyncError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CertSyncPaths;
const PROGRAM_NAME: &str = "certsync";

/// Conventional live-certificate directory of the ACME client.
pub const DEFAULT_CERT_ROOT: &str = "/etc/letsencrypt/live";
/// Directory archived by backups.
pub const DEFAULT_BACKUP_SOURCE: &str = "/etc/letsencrypt";

impl CertSyncPaths {
    /// Get the config directory: ~/.config/certsync/
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| CertSyncError::Config("Cannot determine config directory".to_string()))
    }

    /// Get the default config file path: ~/.config/certsync/config.yaml
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Get the base data directory: ~/.local/share/certsync/
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| {
                CertSyncError::Config("Cannot determine local data directory".to_string())
            })
    }

    /// Get the default backup staging directory: ~/.local/share/certsync/backup/
    pub fn backup_staging_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("backup"))
    }

    /// Expand a leading `~/` to the user's home directory
    pub fn expand_home(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Ensure a directory exists with proper permissions
    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;

            // Certificate and backup directories hold private keys (700)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(path)?.permissions();
                perms.set_mode(0o700);
                fs::set_permissions(path, perms)?;
            }
        }
        Ok(())
    }

    /// Restrict a file to owner read/write
    pub fn set_secure_file_permissions(path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }
        #[cfg(not(unix))]
        let _ = path;
        Ok(())
    }
}
