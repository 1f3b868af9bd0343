use crate::utils::errors::{CertSyncError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// An enabled nginx site that proxies a domain to an upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEntry {
    pub file: String,
    pub domain: String,
    pub proxy_pass: String,
    pub port: String,
}

fn server_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"server_name\s+(.+?);").expect("valid regex"))
}

fn proxy_pass_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"proxy_pass\s+(https?://[^/;\s]+)(/[^;]*)?;").expect("valid regex")
    })
}

/// Extract the first `server_name` and `proxy_pass` of a site config
pub fn parse_site_config(file: &str, content: &str) -> Option<SiteEntry> {
    let domain = server_name_re().captures(content)?.get(1)?.as_str().trim();
    let proxy_pass = proxy_pass_re().captures(content)?.get(1)?.as_str();
    let port = proxy_pass
        .rsplit_once(':')
        .map(|(_, p)| p)
        .filter(|p| p.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or("")
        .to_string();

    Some(SiteEntry {
        file: file.to_string(),
        domain: domain.to_string(),
        proxy_pass: proxy_pass.to_string(),
        port,
    })
}

/// Enabled sites under `dir`, sorted by file name. Files without a proxied
/// server block are skipped.
pub fn list_sites(dir: &Path) -> Result<Vec<SiteEntry>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CertSyncError::Config(format!("Cannot read sites directory {}: {e}", dir.display()))
    })?;

    let mut sites = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Skipping unreadable site {}: {}", path.display(), e);
                continue;
            }
        };
        let file = entry.file_name().to_string_lossy().to_string();
        if let Some(site) = parse_site_config(&file, &content) {
            sites.push(site);
        }
    }

    sites.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(sites)
}
