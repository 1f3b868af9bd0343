use crate::backup::{restore_archives, BackupArchiver};
use crate::cert::{CertificateKey, CertificateParser};
use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::issuer::{CertbotIssuer, ProcessRunner, SystemProcessRunner};
use crate::proxy::{list_sites, ProxyServer, ProxySiteConfigurator};
use crate::resolver::{
    self, BatchDriver, BatchReport, ConfigureStatus, CertificateResolver, FinalState, HookStatus,
    Location, MirrorStatus, SiteTarget,
};
use crate::storage::{LocalCertStore, ObjectStore, RemoteCertStore, S3ObjectStore};
use crate::utils::config::Settings;
use crate::utils::errors::{CertSyncError, Result};
use crate::utils::output::OutputFormat;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Run a parsed command line and return the process exit code
pub async fn handle_command(cli: Cli) -> Result<i32> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "certsync=warn",  // Default: warnings only
            1 => "certsync=info",  // -v: info level
            2 => "certsync=debug", // -vv: debug level
            _ => "certsync=trace", // -vvv+: trace level
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.raw);

    match cli.command {
        Commands::Completion { ref command } => {
            handle_completion_command(command)?;
            Ok(0)
        }
        Commands::Sites { ref dir } => {
            let settings = load_settings(&cli)?;
            handle_sites(&settings, dir.as_deref(), &output)?;
            Ok(0)
        }
        Commands::Apply {
            ref domains,
            ref ports,
            ref email,
            server,
            backup,
        } => {
            if domains.len() != ports.len() {
                return Err(CertSyncError::InvalidInput(format!(
                    "Got {} domains but {} ports; each domain needs exactly one port",
                    domains.len(),
                    ports.len()
                )));
            }
            let mut settings = load_settings(&cli)?;
            apply_issuer_overrides(&mut settings, email.as_deref(), server);
            let keys = parse_keys(domains, settings.remote.routing_key.as_deref())?;
            let targets: Vec<SiteTarget> = keys
                .into_iter()
                .zip(ports.iter())
                .map(|(key, port)| SiteTarget {
                    key,
                    port: Some(*port),
                })
                .collect();
            handle_batch(&settings, targets, true, backup, &output).await
        }
        Commands::Resolve {
            ref domains,
            ref email,
            server,
            backup,
        } => {
            let mut settings = load_settings(&cli)?;
            apply_issuer_overrides(&mut settings, email.as_deref(), server);
            let targets: Vec<SiteTarget> =
                parse_keys(domains, settings.remote.routing_key.as_deref())?
                    .into_iter()
                    .map(|key| SiteTarget { key, port: None })
                    .collect();
            handle_batch(&settings, targets, false, backup, &output).await
        }
        Commands::Status { ref domains } => {
            let settings = load_settings(&cli)?;
            handle_status(&settings, domains, &output).await
        }
        Commands::Push { ref domains } => {
            let settings = load_settings(&cli)?;
            handle_push(&settings, domains, &output).await
        }
        Commands::Backup => {
            let settings = load_settings(&cli)?;
            let objects = connect_objects(&settings).await?;
            let archiver =
                BackupArchiver::new(&settings.backup, settings.backup_staging_dir()?, objects);
            let (archive, outcome) = archiver.run().await?;
            output.print_key_value(&[
                ("archive".to_string(), archive.display().to_string()),
                ("upload".to_string(), outcome.as_str().to_string()),
            ]);
            Ok(0)
        }
        Commands::Restore { ref local_dir } => {
            let settings = load_settings(&cli)?;
            let objects = connect_objects(&settings).await?;
            let summary =
                restore_archives(objects.as_ref(), &settings.backup.object_prefix, local_dir)
                    .await?;
            output.print_key_value(&[
                ("restored".to_string(), summary.restored.len().to_string()),
                ("skipped".to_string(), summary.skipped.len().to_string()),
                ("failed".to_string(), summary.failed.len().to_string()),
            ]);
            Ok(if summary.failed.is_empty() { 0 } else { 1 })
        }
    }
}

/// Config file first, then global flags and their environment variables
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    if let Some(cert_root) = &cli.cert_root {
        settings.cert_root = cert_root.clone();
    }
    if let Some(bucket) = &cli.bucket {
        settings.remote.bucket = Some(bucket.clone());
    }
    if let Some(prefix) = &cli.prefix {
        settings.remote.prefix = prefix.clone();
    }
    if let Some(routing_key) = &cli.routing_key {
        settings.remote.routing_key = Some(routing_key.clone());
    }

    settings.align_with_issuer_dir();
    settings.validate()?;
    Ok(settings)
}

fn apply_issuer_overrides(
    settings: &mut Settings,
    email: Option<&str>,
    server: Option<ProxyServer>,
) {
    if let Some(email) = email {
        settings.issuer.email = Some(email.to_string());
    }
    if let Some(server) = server {
        settings.proxy.server = server;
    }
}

fn parse_keys(domains: &[String], routing_key: Option<&str>) -> Result<Vec<CertificateKey>> {
    domains
        .iter()
        .map(|domain| CertificateKey::new(domain, routing_key))
        .collect()
}

async fn connect_objects(settings: &Settings) -> Result<Arc<dyn ObjectStore>> {
    settings.bucket()?;
    let store = S3ObjectStore::connect(&settings.remote).await?;
    Ok(Arc::new(store))
}

async fn open_stores(settings: &Settings) -> Result<(LocalCertStore, RemoteCertStore)> {
    let objects = connect_objects(settings).await?;
    let remote = RemoteCertStore::new(objects, &settings.remote.prefix)
        .with_policy(settings.remote.upload_policy);
    Ok((LocalCertStore::new(&settings.cert_root), remote))
}

async fn handle_batch(
    settings: &Settings,
    targets: Vec<SiteTarget>,
    configure_sites: bool,
    backup: bool,
    output: &OutputFormat,
) -> Result<i32> {
    let email = settings.email()?;
    let (local, remote) = open_stores(settings).await?;

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new(
        Duration::from_secs(settings.issuer.timeout_secs),
    ));
    let issuer = CertbotIssuer::new(
        runner.clone(),
        &settings.issuer.program,
        email,
        settings.proxy.server,
    )
    .with_config_dir(settings.issuer.config_dir.clone());

    let configurator = ProxySiteConfigurator::new(&settings.proxy, local.clone(), runner);
    let archiver = BackupArchiver::new(
        &settings.backup,
        settings.backup_staging_dir()?,
        remote.objects().clone(),
    );

    let resolver = CertificateResolver::new(local, remote, Arc::new(issuer));
    let mut driver = BatchDriver::new(&resolver);
    if configure_sites {
        driver = driver.with_configurator(&configurator);
    }
    if backup {
        driver = driver.with_hook(&archiver);
    }

    tracing::info!("Processing {} domain(s)", targets.len());
    let report = driver.run(&targets).await;
    print_batch_report(&report, output);
    Ok(report.exit_code())
}

fn print_batch_report(report: &BatchReport, output: &OutputFormat) {
    let mut rows = vec![vec![
        "DOMAIN".to_string(),
        "STATE".to_string(),
        "ORIGIN".to_string(),
        "MIRROR".to_string(),
        "SITE".to_string(),
    ]];

    for entry in &report.keys {
        let resolution = &entry.resolution;
        let state = match &resolution.final_state {
            FinalState::LocalValid => "valid".to_string(),
            FinalState::Failed(reason) => format!("failed: {reason}"),
        };
        let origin = resolution
            .origin
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mirror = match &resolution.mirror {
            MirrorStatus::NotAttempted => "-".to_string(),
            MirrorStatus::Done(outcome) => outcome.as_str().to_string(),
            MirrorStatus::Failed(e) => format!("failed: {e}"),
        };
        let site = match &entry.configure {
            ConfigureStatus::Skipped => "-".to_string(),
            ConfigureStatus::Configured => "configured".to_string(),
            ConfigureStatus::Failed(e) => format!("failed: {e}"),
        };
        rows.push(vec![
            resolution.key.domain().to_string(),
            state,
            origin,
            mirror,
            site,
        ]);
    }

    output.print_table(&rows);

    match &report.hook {
        HookStatus::NotRun => {}
        HookStatus::Succeeded => tracing::info!("Post-batch backup completed"),
        HookStatus::Failed(e) => eprintln!("Backup failed: {e}"),
    }
    let failed = report.failed_count();
    if failed > 0 {
        eprintln!("{failed} of {} domain(s) failed", report.keys.len());
    }
}

async fn handle_status(
    settings: &Settings,
    domains: &[String],
    output: &OutputFormat,
) -> Result<i32> {
    let keys = parse_keys(domains, settings.remote.routing_key.as_deref())?;
    let (local, remote) = open_stores(settings).await?;

    let (rows, failed) = status_rows(&local, &remote, &keys).await;
    output.print_table(&rows);
    Ok(if failed == 0 { 0 } else { 1 })
}

/// One row per key; a key whose lookup fails gets an error row and the rest
/// are still reported
async fn status_rows(
    local: &LocalCertStore,
    remote: &RemoteCertStore,
    keys: &[CertificateKey],
) -> (Vec<Vec<String>>, usize) {
    let mut rows = vec![vec![
        "DOMAIN".to_string(),
        "LOCATION".to_string(),
        "SUBJECT".to_string(),
        "NOT_AFTER".to_string(),
        "DAYS_LEFT".to_string(),
        "STATUS".to_string(),
    ]];
    let mut failed = 0;

    for key in keys {
        let location = match resolver::locate(local, remote, key).await {
            Ok(location) => location,
            Err(e) => {
                failed += 1;
                let mut row = vec![key.domain().to_string(), format!("error: {e}")];
                row.extend(vec!["-".to_string(); 4]);
                rows.push(row);
                continue;
            }
        };

        let mut details = vec!["-".to_string(); 4];
        if location == Location::Local {
            let parsed = local.read(key).and_then(|artifact| {
                artifact
                    .fullchain_pem()
                    .and_then(CertificateParser::parse_pem)
            });
            match parsed {
                Ok(info) => {
                    details = vec![
                        info.subject.clone(),
                        info.not_after.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                        info.days_remaining().to_string(),
                        if info.is_expired() { "expired" } else { "valid" }.to_string(),
                    ];
                }
                Err(e) => tracing::warn!("Cannot parse certificate for {}: {}", key, e),
            }
        }

        let mut row = vec![key.domain().to_string(), location.to_string()];
        row.extend(details);
        rows.push(row);
    }

    (rows, failed)
}

async fn handle_push(
    settings: &Settings,
    domains: &[String],
    output: &OutputFormat,
) -> Result<i32> {
    let keys = parse_keys(domains, settings.remote.routing_key.as_deref())?;
    let (local, remote) = open_stores(settings).await?;

    let mut rows = vec![vec!["DOMAIN".to_string(), "RESULT".to_string()]];
    let mut failed = 0;

    for key in &keys {
        let result = if local.is_complete(key) {
            match resolver::push(&local, &remote, key).await {
                Ok(outcome) => outcome.as_str().to_string(),
                Err(e) => {
                    failed += 1;
                    format!("failed: {e}")
                }
            }
        } else {
            failed += 1;
            "failed: no complete local certificate".to_string()
        };
        rows.push(vec![key.domain().to_string(), result]);
    }

    output.print_table(&rows);
    Ok(if failed == 0 { 0 } else { 1 })
}

fn handle_sites(settings: &Settings, dir: Option<&Path>, output: &OutputFormat) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => settings
            .proxy
            .sites_enabled
            .clone()
            .unwrap_or_else(|| ProxyServer::Nginx.default_sites_enabled()),
    };

    let sites = list_sites(&dir)?;
    if sites.is_empty() {
        tracing::info!("No proxied sites found in {}", dir.display());
        return Ok(());
    }

    let mut rows = vec![vec![
        "FILE".to_string(),
        "DOMAIN".to_string(),
        "PROXY_PASS".to_string(),
        "PORT".to_string(),
    ]];
    rows.extend(
        sites
            .into_iter()
            .map(|site| vec![site.file, site.domain, site.proxy_pass, site.port]),
    );
    output.print_table(&rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{artifact, MemoryObjectStore};
    use clap::Parser;

    #[test]
    fn test_global_flags_override_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("config.yaml");
        std::fs::write(
            &config,
            "cert_root: /srv/certs\nremote:\n  bucket: from-file\n  prefix: certs\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "certsync",
            "--config",
            config.to_str().unwrap(),
            "--bucket",
            "from-flag",
            "--routing-key",
            "10.0.0.5",
            "status",
            "example.com",
        ])
        .unwrap();

        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.bucket().unwrap(), "from-flag");
        assert_eq!(settings.remote.prefix, "certs");
        assert_eq!(settings.remote.routing_key.as_deref(), Some("10.0.0.5"));
        assert_eq!(settings.cert_root, Path::new("/srv/certs"));
    }

    #[test]
    fn test_issuer_overrides() {
        let mut settings = Settings::default();
        apply_issuer_overrides(&mut settings, Some("ops@example.com"), Some(ProxyServer::Apache));
        assert_eq!(settings.email().unwrap(), "ops@example.com");
        assert_eq!(settings.proxy.server, ProxyServer::Apache);

        apply_issuer_overrides(&mut settings, None, None);
        assert_eq!(settings.proxy.server, ProxyServer::Apache);
    }

    #[test]
    fn test_parse_keys_carries_routing_key() {
        let keys = parse_keys(
            &["a.example.com".to_string(), "b.example.com".to_string()],
            Some("edge"),
        )
        .unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].routing_key(), Some("edge"));

        assert!(parse_keys(&["not a domain".to_string()], None).is_err());
    }

    #[tokio::test]
    async fn test_mismatched_domain_and_port_counts_rejected() {
        let cli = Cli::try_parse_from([
            "certsync",
            "--quiet",
            "apply",
            "--domains",
            "a.example.com",
            "b.example.com",
            "--ports",
            "8080",
        ])
        .unwrap();

        assert!(matches!(
            handle_command(cli).await,
            Err(CertSyncError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_status_reports_lookup_errors_per_key() {
        let tmp = tempfile::tempdir().unwrap();
        let local = LocalCertStore::new(tmp.path().join("live"));
        let objects = Arc::new(MemoryObjectStore::new());
        let remote = RemoteCertStore::new(objects.clone(), "");
        let keys = parse_keys(
            &["a.example.com".to_string(), "b.example.com".to_string()],
            None,
        )
        .unwrap();
        local.write(&keys[0], &artifact("a")).unwrap();
        objects.fail_heads(true);

        let (rows, failed) = status_rows(&local, &remote, &keys).await;

        assert_eq!(failed, 1);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "a.example.com");
        assert_eq!(rows[1][1], "local");
        assert_eq!(rows[2][0], "b.example.com");
        assert!(rows[2][1].starts_with("error: "));
        assert!(rows.iter().all(|row| row.len() == rows[0].len()));
    }
}
