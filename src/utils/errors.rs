use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertSyncError {
    #[error("Remote storage error: {0}")]
    Remote(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Certificate parsing error: {0}")]
    CertParsing(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CertSyncError>;
