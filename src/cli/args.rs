use crate::proxy::ProxyServer;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "certsync")]
#[command(version = "1.0.0")]
#[command(about = "Resolve, mirror and back up Let's Encrypt certificates for reverse-proxied domains")]
#[command(long_about = None)]
pub struct Cli {
    /// Config file path (default: ~/.config/certsync/config.yaml)
    #[arg(long, env = "CERTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local certificate root holding one directory per domain
    #[arg(long, env = "CERTSYNC_CERT_ROOT")]
    pub cert_root: Option<PathBuf>,

    /// Bucket mirroring the certificates
    #[arg(long, visible_alias = "s3-bucket", env = "CERTSYNC_BUCKET")]
    pub bucket: Option<String>,

    /// Object key prefix in front of the certificate paths
    #[arg(long)]
    pub prefix: Option<String>,

    /// Namespace for this host's certificates in the bucket (e.g. its IP address)
    #[arg(long, env = "CERTSYNC_ROUTING_KEY")]
    pub routing_key: Option<String>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve certificates and configure a proxied site for each domain
    Apply {
        /// Domains or subdomains
        #[arg(long, required = true, num_args = 1..)]
        domains: Vec<String>,
        /// Upstream ports, one per domain
        #[arg(long, required = true, num_args = 1..)]
        ports: Vec<u16>,
        /// ACME account email
        #[arg(long, env = "CERTSYNC_EMAIL")]
        email: Option<String>,
        /// Reverse proxy server
        #[arg(long, value_enum)]
        server: Option<ProxyServer>,
        /// Archive and upload the certificate directory when every domain succeeded
        #[arg(long)]
        backup: bool,
    },
    /// Make sure a valid certificate exists locally for each domain
    Resolve {
        /// Domains or subdomains
        #[arg(required = true)]
        domains: Vec<String>,
        /// ACME account email
        #[arg(long, env = "CERTSYNC_EMAIL")]
        email: Option<String>,
        /// Installer plugin used by the ACME client
        #[arg(long, value_enum)]
        server: Option<ProxyServer>,
        /// Archive and upload the certificate directory when every domain succeeded
        #[arg(long)]
        backup: bool,
    },
    /// Show where each domain's certificate lives
    Status {
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Mirror existing local certificates to the bucket
    Push {
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Archive the certificate directory and upload it
    Backup,
    /// Download backup archives missing from a local directory
    Restore {
        /// Local directory receiving the archives
        #[arg(long, default_value = "/etc/letsencrypt")]
        local_dir: PathBuf,
    },
    /// List enabled nginx sites and their upstreams
    Sites {
        /// Sites directory (default: /etc/nginx/sites-enabled)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completion {
        #[command(subcommand)]
        command: CompletionCommands,
    },
}

#[derive(Subcommand)]
pub enum CompletionCommands {
    /// Generate bash completion script
    Bash,
    /// Generate zsh completion script
    Zsh,
    /// Generate fish completion script
    Fish,
    /// Generate PowerShell completion script
    PowerShell,
}

impl CompletionCommands {
    pub fn shell(&self) -> Shell {
        match self {
            CompletionCommands::Bash => Shell::Bash,
            CompletionCommands::Zsh => Shell::Zsh,
            CompletionCommands::Fish => Shell::Fish,
            CompletionCommands::PowerShell => Shell::PowerShell,
        }
    }
}
