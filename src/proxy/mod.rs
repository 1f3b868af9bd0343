pub mod site;
pub mod sites;

pub use site::ProxySiteConfigurator;
pub use sites::{list_sites, SiteEntry};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reverse proxy in front of the upstream services
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyServer {
    #[default]
    Nginx,
    Apache,
}

impl ProxyServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyServer::Nginx => "nginx",
            ProxyServer::Apache => "apache",
        }
    }

    /// Installer plugin flag passed to certbot
    pub fn certbot_plugin(&self) -> &'static str {
        match self {
            ProxyServer::Nginx => "--nginx",
            ProxyServer::Apache => "--apache",
        }
    }

    pub fn default_sites_available(&self) -> PathBuf {
        match self {
            ProxyServer::Nginx => PathBuf::from("/etc/nginx/sites-available"),
            ProxyServer::Apache => PathBuf::from("/etc/apache2/sites-available"),
        }
    }

    pub fn default_sites_enabled(&self) -> PathBuf {
        match self {
            ProxyServer::Nginx => PathBuf::from("/etc/nginx/sites-enabled"),
            ProxyServer::Apache => PathBuf::from("/etc/apache2/sites-enabled"),
        }
    }

    pub fn site_file_name(&self, domain: &str) -> String {
        match self {
            ProxyServer::Nginx => domain.to_string(),
            ProxyServer::Apache => format!("{domain}.conf"),
        }
    }

    /// Commands run, in order, to make the proxy pick up a new site
    pub fn reload_commands(&self) -> Vec<(&'static str, Vec<String>)> {
        match self {
            ProxyServer::Nginx => vec![("nginx", vec!["-s".to_string(), "reload".to_string()])],
            ProxyServer::Apache => vec![
                ("apache2ctl", vec!["configtest".to_string()]),
                (
                    "systemctl",
                    vec!["restart".to_string(), "apache2".to_string()],
                ),
            ],
        }
    }

    /// HTTP to HTTPS redirect plus a TLS site proxying to `upstream:port`
    pub fn render_site_config(
        &self,
        domain: &str,
        upstream_host: &str,
        port: u16,
        fullchain: &Path,
        privkey: &Path,
    ) -> String {
        let fullchain = fullchain.display();
        let privkey = privkey.display();
        match self {
            ProxyServer::Nginx => format!(
                r#"server {{
    listen 80;
    server_name {domain};
    return 301 https://{domain}$request_uri;
}}

server {{
    listen 443 ssl;
    server_name {domain};

    ssl_certificate {fullchain};
    ssl_certificate_key {privkey};

    location / {{
        proxy_pass http://{upstream_host}:{port};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
    }}
}}
"#
            ),
            ProxyServer::Apache => format!(
                r#"<VirtualHost *:80>
    ServerName {domain}
    Redirect permanent / https://{domain}/
</VirtualHost>

<VirtualHost *:443>
    ServerName {domain}

    SSLEngine on
    SSLCertificateFile {fullchain}
    SSLCertificateKeyFile {privkey}

    ProxyPreserveHost On
    ProxyPass / http://{upstream_host}:{port}/
    ProxyPassReverse / http://{upstream_host}:{port}/
</VirtualHost>
"#
            ),
        }
    }
}

impl std::fmt::Display for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
