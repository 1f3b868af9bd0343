pub mod backup;
pub mod cert;
pub mod cli;
pub mod issuer;
pub mod proxy;
pub mod resolver;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export specific items to avoid conflicts
pub use cert::{CertificateArtifact, CertificateKey, CertificateParser};
pub use cli::{args, commands};
pub use resolver::{CertificateResolver, ResolutionResult};
pub use storage::{LocalCertStore, RemoteCertStore};
pub use utils::{config, errors, paths};
