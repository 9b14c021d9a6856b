// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate bundles: what is stored at a target and what an issuance produces.
//!
//! - [`StoredBundle`] is read from the canonical secret each cycle. Anything that
//!   fails to parse is reported as a [`BundleError`] and treated as absent.
//! - [`ObtainedBundle`] is produced once per renewal, archived, then fanned out.

use crate::constants::TLS_CERT_KEY;
use crate::errors::BundleError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use x509_parser::pem::parse_x509_pem;

const PEM_CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_CERT_END: &str = "-----END CERTIFICATE-----";

/// The certificate currently materialized at a target namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBundle {
    /// PEM leaf certificate followed by its chain (`tls.crt`)
    pub certificate: Vec<u8>,
    /// PEM private key (`tls.key`); empty if the secret had none
    pub private_key: Vec<u8>,
    /// Expiry of the leaf certificate
    pub not_after: DateTime<Utc>,
}

impl StoredBundle {
    /// Build a stored bundle from raw secret data.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] when `tls.crt` is missing or its leaf certificate
    /// cannot be parsed.
    pub fn from_secret_data(
        certificate: Option<&[u8]>,
        private_key: Option<&[u8]>,
    ) -> Result<Self, BundleError> {
        let certificate = certificate.ok_or(BundleError::MissingKey { key: TLS_CERT_KEY })?;
        let not_after = parse_not_after(certificate)?;

        Ok(Self {
            certificate: certificate.to_vec(),
            private_key: private_key.map(<[u8]>::to_vec).unwrap_or_default(),
            not_after,
        })
    }
}

/// Output of a successful renewal. Never mutated after creation.
///
/// Serializing this type yields the archive's `info.json`: key material and
/// certificate bytes are skipped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObtainedBundle {
    /// Primary domain (first domain of the certificate spec); names the archive directory
    pub domain: String,
    /// Every domain on the certificate
    pub domains: Vec<String>,
    /// ACME order URL the certificate was issued under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_url: Option<String>,
    /// Expiry of the issued leaf
    pub not_after: DateTime<Utc>,
    /// When the bundle was obtained
    pub obtained_at: DateTime<Utc>,
    /// Full chain PEM (leaf first)
    #[serde(skip)]
    pub certificate: String,
    /// Issuer chain PEM (full chain without the leaf)
    #[serde(skip)]
    pub issuer_certificate: String,
    /// PEM private key
    #[serde(skip)]
    pub private_key: String,
}

impl ObtainedBundle {
    /// Assemble a bundle from an issued full chain and its private key.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] if the issued chain does not start with a parsable
    /// certificate.
    pub fn new(
        domains: &[String],
        certificate_chain: String,
        private_key: String,
        order_url: Option<String>,
        obtained_at: DateTime<Utc>,
    ) -> Result<Self, BundleError> {
        let not_after = parse_not_after(certificate_chain.as_bytes())?;
        let blocks = split_certificate_chain(&certificate_chain);
        let issuer_certificate = blocks.get(1..).map(<[String]>::concat).unwrap_or_default();

        Ok(Self {
            domain: domains.first().cloned().unwrap_or_default(),
            domains: domains.to_vec(),
            order_url,
            not_after,
            obtained_at,
            certificate: certificate_chain,
            issuer_certificate,
            private_key,
        })
    }
}

/// Parse the `notAfter` of the first certificate in a PEM buffer.
///
/// # Errors
///
/// Returns [`BundleError::InvalidPem`] when no PEM block is found and
/// [`BundleError::InvalidCertificate`] when the block is not valid X.509.
pub fn parse_not_after(pem_bytes: &[u8]) -> Result<DateTime<Utc>, BundleError> {
    let (_, pem) = parse_x509_pem(pem_bytes).map_err(|e| BundleError::InvalidPem {
        reason: e.to_string(),
    })?;
    let cert = pem
        .parse_x509()
        .map_err(|e| BundleError::InvalidCertificate {
            reason: e.to_string(),
        })?;
    let timestamp = cert.validity().not_after.timestamp();

    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| BundleError::InvalidCertificate {
        reason: format!("notAfter {timestamp} out of range"),
    })
}

/// Split a PEM buffer into its certificate blocks, each terminated by a newline.
#[must_use]
pub fn split_certificate_chain(pem: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = pem;

    while let Some(start) = rest.find(PEM_CERT_BEGIN) {
        let Some(end) = rest[start..].find(PEM_CERT_END) else {
            break;
        };
        let end = start + end + PEM_CERT_END.len();
        blocks.push(format!("{}\n", &rest[start..end]));
        rest = &rest[end..];
    }

    blocks
}
