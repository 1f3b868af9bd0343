pub mod certbot;
pub mod process;

pub use certbot::CertbotIssuer;
pub use process::{ProcessOutput, ProcessRunner, SystemProcessRunner};

use crate::cert::CertificateKey;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    Succeeded,
    Failed {
        exit_code: Option<i32>,
        detail: String,
    },
}

/// Mints a certificate for a domain. On success the issuer is expected to
/// have written the pair into the local certificate root itself.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, key: &CertificateKey) -> IssuanceOutcome;
}
