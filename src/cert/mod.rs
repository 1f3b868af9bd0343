pub mod artifact;
pub mod key;
pub mod parser;

pub use artifact::{CertificateArtifact, FULLCHAIN_FILE, PRIVKEY_FILE};
pub use key::CertificateKey;
pub use parser::{CertificateInfo, CertificateParser};
