use crate::utils::errors::{CertSyncError, Result};
use std::fmt;

/// Identifies one certificate pair: a domain plus an optional routing key
/// that namespaces the remote store when several hosts share one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateKey {
    domain: String,
    routing_key: Option<String>,
}

impl CertificateKey {
    pub fn new(domain: &str, routing_key: Option<&str>) -> Result<Self> {
        let domain = domain.trim();
        validate_domain(domain)?;

        let routing_key = match routing_key {
            Some(key) => {
                let key = key.trim();
                if key.is_empty() || key.contains('/') || key.contains('\\') {
                    return Err(CertSyncError::InvalidInput(format!(
                        "Invalid routing key: '{key}'"
                    )));
                }
                Some(key.to_string())
            }
            None => None,
        };

        Ok(Self {
            domain: domain.to_string(),
            routing_key,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn routing_key(&self) -> Option<&str> {
        self.routing_key.as_deref()
    }
}

impl fmt::Display for CertificateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.routing_key {
            Some(key) => write!(f, "{}@{}", self.domain, key),
            None => write!(f, "{}", self.domain),
        }
    }
}

fn validate_domain(domain: &str) -> Result<()> {
    let invalid = |why: &str| {
        Err(CertSyncError::InvalidInput(format!(
            "Invalid domain '{domain}': {why}"
        )))
    };

    if domain.is_empty() {
        return invalid("empty");
    }
    if domain.len() > 253 {
        return invalid("longer than 253 characters");
    }

    for (i, label) in domain.split('.').enumerate() {
        if label.is_empty() {
            return invalid("empty label");
        }
        if label == "*" && i == 0 {
            continue;
        }
        if label.len() > 63 {
            return invalid("label longer than 63 characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("label starts or ends with '-'");
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return invalid("unexpected character");
        }
    }

    Ok(())
}
