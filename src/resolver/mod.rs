//! Decides, per certificate key, whether to use the local copy, pull one from
//! the remote store, or issue a new one, and leaves a complete pair on disk.
//!
//! Every call re-derives its state from the filesystem and the remote store;
//! nothing is cached between calls.

pub mod batch;

pub use batch::{
    BatchDriver, BatchHook, BatchReport, ConfigureStatus, HookStatus, KeyReport, SiteConfigurator,
    SiteTarget,
};

use crate::cert::CertificateKey;
use crate::issuer::{CertificateIssuer, IssuanceOutcome};
use crate::storage::{LocalCertStore, RemoteCertStore, UploadOutcome};
use crate::utils::errors::Result;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Per-key state, evaluated fresh on every resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    LocalValid,
    LocalIncomplete,
    RemoteAvailable,
    NeedsIssuance,
}

/// Where a valid pair currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    RemoteOnly,
    Absent,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Location::Local => "local",
            Location::RemoteOnly => "remote-only",
            Location::Absent => "absent",
        })
    }
}

/// How the local pair came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Downloaded,
    Issued,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Local => "local",
            Origin::Downloaded => "downloaded",
            Origin::Issued => "issued",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("remote storage unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("issuer failed (exit code {}): {detail}", display_code(.exit_code))]
    IssuanceFailed {
        exit_code: Option<i32>,
        detail: String,
    },

    #[error("issuer reported success but left no complete certificate")]
    IssuanceIncomplete,

    #[error("local certificate store: {0}")]
    LocalStore(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalState {
    LocalValid,
    Failed(FailureReason),
}

/// Best-effort mirroring result; never affects `FinalState`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    NotAttempted,
    Done(UploadOutcome),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub key: CertificateKey,
    pub final_state: FinalState,
    pub origin: Option<Origin>,
    pub mirror: MirrorStatus,
    /// The remote store is confirmed to hold this pair after the sync pass
    pub mirrored: bool,
}

impl ResolutionResult {
    pub fn is_valid(&self) -> bool {
        self.final_state == FinalState::LocalValid
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.final_state {
            FinalState::Failed(reason) => Some(reason),
            FinalState::LocalValid => None,
        }
    }
}

pub struct CertificateResolver {
    local: LocalCertStore,
    remote: RemoteCertStore,
    issuer: Arc<dyn CertificateIssuer>,
}

impl CertificateResolver {
    pub fn new(
        local: LocalCertStore,
        remote: RemoteCertStore,
        issuer: Arc<dyn CertificateIssuer>,
    ) -> Self {
        Self {
            local,
            remote,
            issuer,
        }
    }

    pub fn local(&self) -> &LocalCertStore {
        &self.local
    }

    pub fn remote(&self) -> &RemoteCertStore {
        &self.remote
    }

    /// Guarantee a complete local pair for `key`, or report why not
    pub async fn resolve(&self, key: &CertificateKey) -> ResolutionResult {
        match self.acquire(key).await {
            Ok(origin) => {
                let mirror = if origin == Origin::Issued {
                    self.mirror(key).await
                } else {
                    MirrorStatus::NotAttempted
                };
                let mirrored = matches!(mirror, MirrorStatus::Done(_));

                tracing::info!("Certificate for {} is valid ({})", key, origin);
                ResolutionResult {
                    key: key.clone(),
                    final_state: FinalState::LocalValid,
                    origin: Some(origin),
                    mirror,
                    mirrored,
                }
            }
            Err(reason) => {
                tracing::error!("Certificate resolution for {} failed: {}", key, reason);
                ResolutionResult {
                    key: key.clone(),
                    final_state: FinalState::Failed(reason),
                    origin: None,
                    mirror: MirrorStatus::NotAttempted,
                    mirrored: false,
                }
            }
        }
    }

    async fn acquire(&self, key: &CertificateKey) -> std::result::Result<Origin, FailureReason> {
        if self.local.is_complete(key) {
            tracing::debug!("Certificate for {} is {:?}", key, ResolutionState::LocalValid);
            return Ok(Origin::Local);
        }

        if self.local.is_incomplete_present(key) {
            tracing::warn!(
                "Certificate for {} is {:?}, purging {}",
                key,
                ResolutionState::LocalIncomplete,
                self.local.domain_dir(key).display()
            );
            self.local
                .purge(key)
                .map_err(|e| FailureReason::LocalStore(e.to_string()))?;
        }

        let state = match self.remote.exists(key).await {
            Ok(true) => ResolutionState::RemoteAvailable,
            Ok(false) => ResolutionState::NeedsIssuance,
            Err(e) => {
                self.discard(key);
                return Err(FailureReason::RemoteUnavailable(e.to_string()));
            }
        };
        tracing::debug!("Certificate for {} is {:?}", key, state);

        match state {
            ResolutionState::RemoteAvailable => {
                self.pull(key).await?;
                Ok(Origin::Downloaded)
            }
            _ => {
                self.issue(key).await?;
                Ok(Origin::Issued)
            }
        }
    }

    async fn pull(&self, key: &CertificateKey) -> std::result::Result<(), FailureReason> {
        tracing::info!(
            "Downloading certificate for {} from {}",
            key,
            self.remote.objects().describe()
        );

        let artifact = match self.remote.download(key).await {
            Ok(artifact) => artifact,
            Err(e) => {
                self.discard(key);
                return Err(FailureReason::RemoteUnavailable(e.to_string()));
            }
        };

        if let Err(e) = self.local.write(key, &artifact) {
            self.discard(key);
            return Err(FailureReason::LocalStore(e.to_string()));
        }
        Ok(())
    }

    async fn issue(&self, key: &CertificateKey) -> std::result::Result<(), FailureReason> {
        match self.issuer.issue(key).await {
            IssuanceOutcome::Succeeded => {
                if self.local.is_complete(key) {
                    Ok(())
                } else {
                    self.discard(key);
                    Err(FailureReason::IssuanceIncomplete)
                }
            }
            IssuanceOutcome::Failed { exit_code, detail } => {
                self.discard(key);
                Err(FailureReason::IssuanceFailed { exit_code, detail })
            }
        }
    }

    async fn mirror(&self, key: &CertificateKey) -> MirrorStatus {
        let result = match self.local.read(key) {
            Ok(artifact) => self.remote.upload(key, &artifact).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(outcome) => MirrorStatus::Done(outcome),
            Err(e) => {
                tracing::warn!("Mirroring certificate for {} failed: {}", key, e);
                MirrorStatus::Failed(e.to_string())
            }
        }
    }

    /// Remove whatever a failed pass left behind
    fn discard(&self, key: &CertificateKey) {
        if let Err(e) = self.local.purge(key) {
            tracing::error!("Failed to clean up {}: {}", key, e);
        }
    }

    /// Read-only view of where the pair for `key` lives
    pub async fn locate(&self, key: &CertificateKey) -> Result<Location> {
        locate(&self.local, &self.remote, key).await
    }

    pub async fn push(&self, key: &CertificateKey) -> Result<UploadOutcome> {
        push(&self.local, &self.remote, key).await
    }
}

/// Where the pair for `key` lives, without changing anything
pub async fn locate(
    local: &LocalCertStore,
    remote: &RemoteCertStore,
    key: &CertificateKey,
) -> Result<Location> {
    if local.is_complete(key) {
        return Ok(Location::Local);
    }
    if remote.exists(key).await? {
        Ok(Location::RemoteOnly)
    } else {
        Ok(Location::Absent)
    }
}

/// Mirror an existing local pair, e.g. one issued before remote storage was set up
pub async fn push(
    local: &LocalCertStore,
    remote: &RemoteCertStore,
    key: &CertificateKey,
) -> Result<UploadOutcome> {
    let artifact = local.read(key)?;
    remote.upload(key, &artifact).await
}
