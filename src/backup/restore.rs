use crate::storage::local::atomic_write;
use crate::storage::object::ObjectStore;
use crate::utils::errors::Result;
use crate::utils::paths::CertSyncPaths;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Download every backup archive under `prefix` that is not already in
/// `local_dir`. Individual failures are logged and counted.
pub async fn restore_archives(
    objects: &dyn ObjectStore,
    prefix: &str,
    local_dir: &Path,
) -> Result<RestoreSummary> {
    let prefix = format!("{}/", prefix.trim_matches('/'));
    let keys = objects.list(&prefix).await?;
    CertSyncPaths::ensure_dir_exists(local_dir)?;

    let mut summary = RestoreSummary::default();
    for key in keys {
        let Some(file_name) = key.rsplit('/').next().filter(|n| !n.is_empty()) else {
            continue;
        };
        let target = local_dir.join(file_name);

        if target.exists() {
            tracing::info!("Skipping {} - already exists locally", file_name);
            summary.skipped.push(file_name.to_string());
            continue;
        }

        tracing::info!("Restoring {}", file_name);
        match objects.get(&key).await {
            Ok(Some(body)) => match atomic_write(&target, &body, true) {
                Ok(()) => summary.restored.push(file_name.to_string()),
                Err(e) => {
                    tracing::warn!("Failed to write {}: {}", target.display(), e);
                    summary.failed.push(file_name.to_string());
                }
            },
            Ok(None) => {
                tracing::warn!("Failed to restore {}: object vanished", file_name);
                summary.failed.push(file_name.to_string());
            }
            Err(e) => {
                tracing::warn!("Failed to restore {}: {}", file_name, e);
                summary.failed.push(file_name.to_string());
            }
        }
    }

    Ok(summary)
}
