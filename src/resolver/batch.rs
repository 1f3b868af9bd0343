use crate::cert::CertificateKey;
use crate::resolver::{CertificateResolver, ResolutionResult};
use crate::utils::errors::Result;
use async_trait::async_trait;

/// One domain of a batch, with the upstream port its site proxies to
#[derive(Debug, Clone)]
pub struct SiteTarget {
    pub key: CertificateKey,
    pub port: Option<u16>,
}

/// Downstream step run for every key that resolved to a valid local pair
#[async_trait]
pub trait SiteConfigurator: Send + Sync {
    async fn configure(&self, domain: &str, port: u16) -> Result<()>;
}

/// Runs once after every key of a batch resolved and configured successfully
#[async_trait]
pub trait BatchHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_success(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureStatus {
    Skipped,
    Configured,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct KeyReport {
    pub resolution: ResolutionResult,
    pub configure: ConfigureStatus,
}

impl KeyReport {
    pub fn succeeded(&self) -> bool {
        self.resolution.is_valid() && !matches!(self.configure, ConfigureStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookStatus {
    NotRun,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub keys: Vec<KeyReport>,
    pub hook: HookStatus,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.keys.iter().filter(|k| !k.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0 && !matches!(self.hook, HookStatus::Failed(_))
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }
}

/// Resolves a batch strictly one key at a time. A failing key never stops
/// the remaining ones.
pub struct BatchDriver<'a> {
    resolver: &'a CertificateResolver,
    configurator: Option<&'a dyn SiteConfigurator>,
    hook: Option<&'a dyn BatchHook>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(resolver: &'a CertificateResolver) -> Self {
        Self {
            resolver,
            configurator: None,
            hook: None,
        }
    }

    pub fn with_configurator(mut self, configurator: &'a dyn SiteConfigurator) -> Self {
        self.configurator = Some(configurator);
        self
    }

    pub fn with_hook(mut self, hook: &'a dyn BatchHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub async fn run(&self, targets: &[SiteTarget]) -> BatchReport {
        let mut keys = Vec::with_capacity(targets.len());

        for target in targets {
            let resolution = self.resolver.resolve(&target.key).await;
            let configure = if resolution.is_valid() {
                self.configure(target).await
            } else {
                ConfigureStatus::Skipped
            };
            keys.push(KeyReport {
                resolution,
                configure,
            });
        }

        let mut report = BatchReport {
            keys,
            hook: HookStatus::NotRun,
        };

        if let Some(hook) = self.hook {
            if report.failed_count() == 0 {
                report.hook = match hook.after_success().await {
                    Ok(()) => HookStatus::Succeeded,
                    Err(e) => {
                        tracing::error!("Post-batch step '{}' failed: {}", hook.name(), e);
                        HookStatus::Failed(e.to_string())
                    }
                };
            } else {
                tracing::warn!(
                    "Skipping post-batch step '{}': {} key(s) failed",
                    hook.name(),
                    report.failed_count()
                );
            }
        }

        report
    }

    async fn configure(&self, target: &SiteTarget) -> ConfigureStatus {
        let (Some(configurator), Some(port)) = (self.configurator, target.port) else {
            return ConfigureStatus::Skipped;
        };

        match configurator.configure(target.key.domain(), port).await {
            Ok(()) => ConfigureStatus::Configured,
            Err(e) => {
                tracing::error!("Configuring site for {} failed: {}", target.key, e);
                ConfigureStatus::Failed(e.to_string())
            }
        }
    }
}
