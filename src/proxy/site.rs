use crate::cert::CertificateKey;
use crate::issuer::ProcessRunner;
use crate::proxy::ProxyServer;
use crate::resolver::SiteConfigurator;
use crate::storage::LocalCertStore;
use crate::utils::config::ProxySettings;
use crate::utils::errors::{CertSyncError, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes a reverse-proxy site for a domain, enables it and reloads the proxy
pub struct ProxySiteConfigurator {
    server: ProxyServer,
    sites_available: PathBuf,
    sites_enabled: PathBuf,
    upstream_host: String,
    local: LocalCertStore,
    runner: Arc<dyn ProcessRunner>,
}

impl ProxySiteConfigurator {
    pub fn new(
        settings: &ProxySettings,
        local: LocalCertStore,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let server = settings.server;
        Self {
            server,
            sites_available: settings
                .sites_available
                .clone()
                .unwrap_or_else(|| server.default_sites_available()),
            sites_enabled: settings
                .sites_enabled
                .clone()
                .unwrap_or_else(|| server.default_sites_enabled()),
            upstream_host: settings.upstream_host.clone(),
            local,
            runner,
        }
    }

    fn write_site(&self, domain: &str, port: u16) -> Result<PathBuf> {
        let key = CertificateKey::new(domain, None)?;
        let config = self.server.render_site_config(
            domain,
            &self.upstream_host,
            port,
            &self.local.fullchain_path(&key),
            &self.local.privkey_path(&key),
        );

        let file_name = self.server.site_file_name(domain);
        let available = self.sites_available.join(&file_name);
        let enabled = self.sites_enabled.join(&file_name);

        fs::create_dir_all(&self.sites_available)?;
        fs::create_dir_all(&self.sites_enabled)?;
        fs::write(&available, config)?;

        if fs::symlink_metadata(&enabled).is_ok() {
            fs::remove_file(&enabled)?;
        }
        enable_site(&available, &enabled)?;

        tracing::info!(
            "{} site for {} written to {}",
            self.server,
            domain,
            available.display()
        );
        Ok(available)
    }

    async fn reload(&self) -> Result<()> {
        for (program, args) in self.server.reload_commands() {
            let output = self.runner.run(program, &args).await?;
            if !output.success() {
                return Err(CertSyncError::Process(format!(
                    "{program} {} failed: {}",
                    args.join(" "),
                    output.summary()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn enable_site(available: &Path, enabled: &Path) -> Result<()> {
    std::os::unix::fs::symlink(available, enabled)?;
    Ok(())
}

#[cfg(not(unix))]
fn enable_site(available: &Path, enabled: &Path) -> Result<()> {
    fs::copy(available, enabled)?;
    Ok(())
}

#[async_trait]
impl SiteConfigurator for ProxySiteConfigurator {
    async fn configure(&self, domain: &str, port: u16) -> Result<()> {
        self.write_site(domain, port)?;
        self.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn configurator(
        tmp: &Path,
        server: ProxyServer,
        runner: Arc<ScriptedRunner>,
    ) -> ProxySiteConfigurator {
        let settings = ProxySettings {
            server,
            sites_available: Some(tmp.join("sites-available")),
            sites_enabled: Some(tmp.join("sites-enabled")),
            upstream_host: "localhost".to_string(),
        };
        ProxySiteConfigurator::new(&settings, LocalCertStore::new(tmp.join("live")), runner)
    }

    #[tokio::test]
    async fn test_nginx_site_written_enabled_and_reloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let configurator = configurator(tmp.path(), ProxyServer::Nginx, runner.clone());

        configurator.configure("example.com", 8080).await.unwrap();
        // reconfiguring replaces the existing link
        configurator.configure("example.com", 9090).await.unwrap();

        let enabled = tmp.path().join("sites-enabled").join("example.com");
        let content = fs::read_to_string(&enabled).unwrap();
        assert!(content.contains("proxy_pass http://localhost:9090;"));
        assert!(content.contains(&format!(
            "ssl_certificate {};",
            tmp.path().join("live/example.com/fullchain.pem").display()
        )));
        assert_eq!(runner.programs(), vec!["nginx", "nginx"]);
        assert_eq!(runner.calls()[0].1, vec!["-s", "reload"]);
    }

    #[tokio::test]
    async fn test_apache_configtest_failure_stops_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_exit("apache2ctl", 1);
        let configurator = configurator(tmp.path(), ProxyServer::Apache, runner.clone());

        let result = configurator.configure("example.com", 8080).await;

        assert!(matches!(result, Err(CertSyncError::Process(_))));
        assert_eq!(runner.programs(), vec!["apache2ctl"]);
        assert!(tmp
            .path()
            .join("sites-available")
            .join("example.com.conf")
            .exists());
    }
}
