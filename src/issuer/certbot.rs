use crate::cert::CertificateKey;
use crate::issuer::process::ProcessRunner;
use crate::issuer::{CertificateIssuer, IssuanceOutcome};
use crate::proxy::ProxyServer;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Issues certificates by running the certbot ACME client
pub struct CertbotIssuer {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    email: String,
    server: ProxyServer,
    config_dir: Option<PathBuf>,
}

impl CertbotIssuer {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        program: &str,
        email: &str,
        server: ProxyServer,
    ) -> Self {
        Self {
            runner,
            program: program.to_string(),
            email: email.to_string(),
            server,
            config_dir: None,
        }
    }

    pub fn with_config_dir(mut self, config_dir: Option<PathBuf>) -> Self {
        self.config_dir = config_dir;
        self
    }

    pub fn build_args(&self, domain: &str) -> Vec<String> {
        let mut args = vec![
            self.server.certbot_plugin().to_string(),
            "-d".to_string(),
            domain.to_string(),
            "--agree-tos".to_string(),
            "-m".to_string(),
            self.email.clone(),
            "--non-interactive".to_string(),
        ];
        if let Some(dir) = &self.config_dir {
            args.push("--config-dir".to_string());
            args.push(dir.to_string_lossy().to_string());
        }
        args
    }
}

#[async_trait]
impl CertificateIssuer for CertbotIssuer {
    async fn issue(&self, key: &CertificateKey) -> IssuanceOutcome {
        let args = self.build_args(key.domain());
        tracing::info!("Requesting new certificate for {} via {}", key, self.program);

        match self.runner.run(&self.program, &args).await {
            Ok(output) if output.success() => IssuanceOutcome::Succeeded,
            Ok(output) => IssuanceOutcome::Failed {
                exit_code: output.exit_code,
                detail: output.summary(),
            },
            Err(e) => IssuanceOutcome::Failed {
                exit_code: None,
                detail: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_build_args() {
        let runner = Arc::new(ScriptedRunner::new());
        let issuer = CertbotIssuer::new(runner, "certbot", "ops@example.com", ProxyServer::Nginx);
        assert_eq!(
            issuer.build_args("example.com"),
            vec![
                "--nginx",
                "-d",
                "example.com",
                "--agree-tos",
                "-m",
                "ops@example.com",
                "--non-interactive"
            ]
        );

        let runner = Arc::new(ScriptedRunner::new());
        let issuer = CertbotIssuer::new(runner, "certbot", "ops@example.com", ProxyServer::Apache)
            .with_config_dir(Some(PathBuf::from("/srv/le")));
        let args = issuer.build_args("example.com");
        assert_eq!(args[0], "--apache");
        assert_eq!(&args[args.len() - 2..], ["--config-dir", "/srv/le"]);
    }

    #[tokio::test]
    async fn test_exit_code_decides_outcome() {
        let key = CertificateKey::new("example.com", None).unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        runner.push_exit("certbot", 0);
        let issuer = CertbotIssuer::new(runner.clone(), "certbot", "a@b.c", ProxyServer::Nginx);
        assert_eq!(issuer.issue(&key).await, IssuanceOutcome::Succeeded);
        assert_eq!(runner.calls()[0].0, "certbot");

        let runner = Arc::new(ScriptedRunner::new());
        runner.push_exit("certbot", 1);
        let issuer = CertbotIssuer::new(runner, "certbot", "a@b.c", ProxyServer::Nginx);
        assert!(matches!(
            issuer.issue(&key).await,
            IssuanceOutcome::Failed {
                exit_code: Some(1),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_issuance_failure() {
        let key = CertificateKey::new("example.com", None).unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_spawn_error("certbot");
        let issuer = CertbotIssuer::new(runner, "certbot", "a@b.c", ProxyServer::Nginx);
        assert!(matches!(
            issuer.issue(&key).await,
            IssuanceOutcome::Failed {
                exit_code: None,
                ..
            }
        ));
    }
}
