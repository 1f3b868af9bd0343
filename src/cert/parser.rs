use crate::utils::errors::{CertSyncError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

/// Summary of the leaf certificate in a full chain
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sans: Vec<String>,
}

impl CertificateInfo {
    pub fn is_expired(&self) -> bool {
        self.not_after < Utc::now()
    }

    pub fn days_remaining(&self) -> i64 {
        (self.not_after - Utc::now()).num_days()
    }
}

pub struct CertificateParser;

impl CertificateParser {
    /// Parse the first certificate of a PEM bundle
    pub fn parse_pem(pem_data: &str) -> Result<CertificateInfo> {
        let cert_data = Self::extract_cert_from_pem(pem_data)?;

        let der_bytes = general_purpose::STANDARD
            .decode(&cert_data)
            .map_err(|e| CertSyncError::CertParsing(format!("Base64 decode error: {e}")))?;

        let (_, cert) = X509Certificate::from_der(&der_bytes)
            .map_err(|e| CertSyncError::CertParsing(format!("DER parsing error: {e}")))?;

        Ok(Self::extract_info(&cert))
    }

    /// Extract the first certificate block from PEM format
    fn extract_cert_from_pem(pem_data: &str) -> Result<String> {
        let mut in_cert = false;
        let mut cert_lines = Vec::new();

        for line in pem_data.lines() {
            let line = line.trim();
            if line == "-----BEGIN CERTIFICATE-----" {
                in_cert = true;
                continue;
            } else if line == "-----END CERTIFICATE-----" {
                break;
            } else if in_cert {
                cert_lines.push(line);
            }
        }

        if cert_lines.is_empty() {
            return Err(CertSyncError::CertParsing(
                "No certificate data found in PEM".to_string(),
            ));
        }

        Ok(cert_lines.join(""))
    }

    fn extract_info(cert: &X509Certificate) -> CertificateInfo {
        let common_name = |name: &X509Name| {
            name.iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .unwrap_or("Unknown")
                .to_string()
        };

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .unwrap_or_else(Utc::now);
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .unwrap_or_else(Utc::now);

        let mut sans = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    sans.push(dns.to_string());
                }
            }
        }

        CertificateInfo {
            subject: common_name(cert.subject()),
            issuer: common_name(cert.issuer()),
            not_before,
            not_after,
            sans,
        }
    }
}
